//! Logging setup and terminal output helpers.

use std::io::{self, Write};
use std::time::Duration;

use clap::ValueEnum;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_core::{Event, Subscriber};
use tracing_subscriber::{
    EnvFilter,
    fmt::{
        FmtContext, FormatEvent, FormatFields, MakeWriter,
        format::{self, Format},
    },
    prelude::*,
    registry::LookupSpan,
};

/// Whether to use colored output.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Color {
    /// Use colors when the output is a terminal
    #[default]
    Auto,
    Always,
    Never,
}

impl Color {
    /// Apply the choice to all terminal output.
    pub fn apply(self) {
        match self {
            Color::Auto => {}
            Color::Always => {
                console::set_colors_enabled(true);
                console::set_colors_enabled_stderr(true);
            }
            Color::Never => {
                console::set_colors_enabled(false);
                console::set_colors_enabled_stderr(false);
            }
        }
    }

    fn use_ansi(self) -> bool {
        match self {
            Color::Auto => console::colors_enabled_stderr(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

/// Writes log lines to stderr without breaking progress bars.
#[derive(Clone)]
pub struct IndicatifWriter {
    progress_bars: MultiProgress,
}

impl IndicatifWriter {
    pub(crate) fn new(pb: MultiProgress) -> Self {
        Self { progress_bars: pb }
    }
}

impl io::Write for IndicatifWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.progress_bars.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.progress_bars.suspend(|| io::stderr().flush())
    }
}

impl<'a> MakeWriter<'a> for IndicatifWriter {
    type Writer = IndicatifWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Prints informational messages of hpc-build as plain lines and everything
/// else in the default tracing format.
pub struct TracingFormatter;

impl<S, N> FormatEvent<S, N> for TracingFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();

        if *metadata.level() == tracing_core::metadata::Level::INFO
            && metadata.target().starts_with("hpc_build")
        {
            ctx.format_fields(writer.by_ref(), event)?;
            writeln!(writer)
        } else {
            Format::default().format_event(ctx, writer, event)
        }
    }
}

/// The default [`EnvFilter`] when the user did not set `RUST_LOG`.
pub fn get_default_env_filter(verbosity: &Verbosity<InfoLevel>) -> EnvFilter {
    let level = verbosity.log_level_filter().to_string().to_lowercase();
    // also covers the `hpc_build_script` and `hpc_build_toolchain` targets
    EnvFilter::new(format!("hpc_build={level}"))
}

/// Install the global tracing subscriber.
pub fn init_logging(
    verbosity: &Verbosity<InfoLevel>,
    color: Color,
    multi_progress: MultiProgress,
) {
    color.apply();

    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => get_default_env_filter(verbosity),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(color.use_ansi())
                .with_writer(IndicatifWriter::new(multi_progress))
                .event_format(TracingFormatter),
        )
        .init();
}

/// A spinner that is shown while waiting for an external command.
pub fn spinner(multi_progress: &MultiProgress, message: String) -> ProgressBar {
    let pb = multi_progress.add(ProgressBar::new_spinner());
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
