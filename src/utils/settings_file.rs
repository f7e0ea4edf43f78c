//! Load `searchkind.toml` (CLI only). Library callers build [`Config`](crate::Config) directly.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::types::UnknownPolicy;
use crate::utils::config::{PackagePaths, Settings};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SettingsFile {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    queries: Option<String>,
    output_dir: Option<String>,
    url: Option<String>,
    rps: Option<u32>,
    retry: Option<u32>,
    timeout_secs: Option<u64>,
    workers: Option<usize>,
    csv_separator: Option<String>,
    presets_separator: Option<String>,
    unknown: Option<UnknownPolicy>,
    ignore_reasons: Option<Vec<String>>,
    log_period_ms: Option<u64>,
    verbose: Option<bool>,
}

/// Load settings from `explicit`, or from the default file in `dir` if present.
/// A missing default file is not an error; a missing explicit one is.
pub(crate) fn load_settings_file(
    explicit: Option<&Path>,
    dir: &Path,
) -> anyhow::Result<Option<SettingsFile>> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let p = dir.join(PackagePaths::get().settings_filename());
            if !p.is_file() {
                return Ok(None);
            }
            p
        }
    };
    let s = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
    let file = toml::from_str(&s).map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
    log::debug!("Loaded settings from {}", path.display());
    Ok(Some(file))
}

/// Overwrite settings field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $settings:expr, $sec_field:ident => $settings_field:ident) => {
        if let Some(v) = $sec.$sec_field.clone() {
            $settings.$settings_field = v;
        }
    };
}

/// Apply file values to settings (only fields present in the file). Call before applying CLI.
pub(crate) fn apply_file_to_settings(file: &SettingsFile, settings: &mut Settings) {
    let sec = &file.settings;
    if let Some(ref p) = sec.queries {
        settings.queries_path = Some(PathBuf::from(p));
    }
    if let Some(ref p) = sec.output_dir {
        settings.output_dir = Some(PathBuf::from(p));
    }
    if let Some(ref u) = sec.url {
        settings.endpoint = Some(u.clone());
    }
    apply_file_opt!(sec, settings, rps => rps);
    apply_file_opt!(sec, settings, retry => retry);
    apply_file_opt!(sec, settings, timeout_secs => timeout_secs);
    apply_file_opt!(sec, settings, workers => worker_limit);
    apply_file_opt!(sec, settings, csv_separator => csv_separator);
    apply_file_opt!(sec, settings, presets_separator => presets_separator);
    apply_file_opt!(sec, settings, unknown => unknown_policy);
    apply_file_opt!(sec, settings, ignore_reasons => ignore_reasons);
    apply_file_opt!(sec, settings, log_period_ms => log_period_ms);
    apply_file_opt!(sec, settings, verbose => verbose);
}
