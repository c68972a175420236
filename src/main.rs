//! This is the main entry point for the `hpc-build` binary.

use clap::Parser;
use indicatif::MultiProgress;

use hpc_build::{
    console_utils::init_logging,
    launch_from_args,
    opt::{App, SubCommands},
    submit_from_args,
    tool_configuration::Configuration,
};

#[tokio::main]
async fn main() -> miette::Result<()> {
    let app = App::parse();

    let multi_progress = MultiProgress::new();
    init_logging(&app.verbose, app.color, multi_progress.clone());

    let config = Configuration::load(app.config_file.as_deref())?;

    match app.subcommand {
        SubCommands::Launch(args) => launch_from_args(args, &config).await,
        SubCommands::Submit(args) => submit_from_args(args, &config, &multi_progress).await,
    }
}
