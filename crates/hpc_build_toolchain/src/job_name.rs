use std::path::Path;

/// Name of the build job for an easyconfig: `{easyconfig}-{host_arch}-{target_arch}`.
///
/// The `.eb` extension is dropped from the easyconfig file name. The target
/// architecture is only appended when it differs from the host architecture.
pub fn job_name(easyconfig: &str, host_arch: Option<&str>, target_arch: Option<&str>) -> String {
    let file_name = Path::new(easyconfig)
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_else(|| easyconfig.into());

    let mut name = file_name
        .strip_suffix(".eb")
        .unwrap_or(&file_name)
        .to_string();

    if let Some(host_arch) = host_arch.filter(|arch| !arch.is_empty()) {
        name.push('-');
        name.push_str(host_arch);
    }

    if let Some(target_arch) = target_arch.filter(|arch| !arch.is_empty())
        && Some(target_arch) != host_arch
    {
        name.push('-');
        name.push_str(target_arch);
    }

    name
}
