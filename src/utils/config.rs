//! Application configuration: constants, defaults, and the validated run config.
//! Tuning and thresholds in one place.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use url::Url;

use crate::error::PipelineError;
use crate::types::UnknownPolicy;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    settings_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                settings_filename: format!("{pkg}.toml"),
            }
        })
    }

    /// Settings file looked up in the working directory when `--config` is not given.
    pub fn settings_filename(&self) -> &str {
        &self.settings_filename
    }
}

/// Env var holding the worker concurrency ceiling.
pub const WORKER_LIMIT_ENV: &str = "SEARCHKIND_WORKER_LIMIT";

// ---- Output layout ----

/// Per-category rows: header `text<sep>query`, then one `text<sep>filter` line per record.
pub const QUERIES_FILE_NAME: &str = "queries.csv";
/// Per-category sorted, separator-joined preset identifiers on a single line.
pub const PRESETS_FILE_NAME: &str = "list.presets";

// ---- Defaults ----

pub struct Defaults;

impl Defaults {
    pub const RPS: u32 = 1;
    pub const RETRY: u32 = 0;
    pub const TIMEOUT_SECS: u64 = 3;
    pub const WORKER_LIMIT: usize = 100;
    pub const LOG_PERIOD_MS: u64 = 3_000;
    pub const CSV_SEPARATOR: &'static str = "\t";
    pub const PRESETS_SEPARATOR: &'static str = ",";
}

/// Raw settings as layered from defaults, settings file and CLI. Turned into [`Config`] by [`Settings::validate`].
#[derive(Clone, Debug)]
pub struct Settings {
    pub queries_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub rps: u32,
    pub retry: u32,
    pub timeout_secs: u64,
    pub worker_limit: usize,
    pub csv_separator: String,
    pub presets_separator: String,
    pub unknown_policy: UnknownPolicy,
    pub ignore_reasons: Vec<String>,
    pub log_period_ms: u64,
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            queries_path: None,
            output_dir: None,
            endpoint: None,
            rps: Defaults::RPS,
            retry: Defaults::RETRY,
            timeout_secs: Defaults::TIMEOUT_SECS,
            worker_limit: Defaults::WORKER_LIMIT,
            csv_separator: Defaults::CSV_SEPARATOR.to_string(),
            presets_separator: Defaults::PRESETS_SEPARATOR.to_string(),
            unknown_policy: UnknownPolicy::default(),
            ignore_reasons: Vec::new(),
            log_period_ms: Defaults::LOG_PERIOD_MS,
            verbose: false,
        }
    }
}

impl Settings {
    /// Check every field and report all problems at once.
    pub fn validate(&self) -> Result<Config, PipelineError> {
        let mut problems = Vec::new();

        let queries_path = match &self.queries_path {
            None => {
                problems.push("queries path is required".to_string());
                None
            }
            Some(p) if !p.is_file() => {
                problems.push(format!("queries path {} is not a file", p.display()));
                None
            }
            Some(p) => Some(p.clone()),
        };

        let endpoint = match self.endpoint.as_deref().map(parse_endpoint) {
            None => {
                problems.push("matching service url is required".to_string());
                None
            }
            Some(Err(msg)) => {
                problems.push(msg);
                None
            }
            Some(Ok(u)) => Some(u),
        };

        if self.rps == 0 {
            problems.push("requests per second must be greater than zero".to_string());
        }
        if self.timeout_secs == 0 {
            problems.push("request timeout must be greater than zero".to_string());
        }
        if self.worker_limit == 0 {
            problems.push(format!("{WORKER_LIMIT_ENV} must be greater than zero"));
        }
        if self.log_period_ms == 0 {
            problems.push("logger period must be at least 1 millisecond".to_string());
        }
        for (name, sep) in [
            ("csv separator", &self.csv_separator),
            ("presets separator", &self.presets_separator),
        ] {
            if sep.is_empty() || sep.contains('\n') {
                problems.push(format!("{name} {sep:?} must be non-empty and single-line"));
            }
        }

        match (queries_path, endpoint) {
            (Some(queries_path), Some(endpoint)) if problems.is_empty() => {
                let output_dir = self
                    .output_dir
                    .clone()
                    .unwrap_or_else(|| parent_dir(&queries_path));
                Ok(Config {
                    queries_path,
                    output_dir,
                    endpoint,
                    rps: self.rps,
                    retry: self.retry,
                    timeout: Duration::from_secs(self.timeout_secs),
                    worker_limit: self.worker_limit,
                    csv_separator: self.csv_separator.clone(),
                    presets_separator: self.presets_separator.clone(),
                    unknown_policy: self.unknown_policy,
                    ignore_reasons: self.ignore_reasons.clone(),
                    log_period: Duration::from_millis(self.log_period_ms),
                })
            }
            _ => Err(PipelineError::Config(problems)),
        }
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("matching service url {raw:?}: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("matching service url {raw:?} must use http or https"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(format!("matching service url {raw:?} has no host"));
    }
    Ok(url)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Validated, immutable run configuration shared read-only by every stage.
#[derive(Clone, Debug)]
pub struct Config {
    pub queries_path: PathBuf,
    /// Root under which `<Category>/queries.csv` and `<Category>/list.presets` are written.
    pub output_dir: PathBuf,
    /// Base URL of the matching service; `query=<text>` is added per request.
    pub endpoint: Url,
    pub rps: u32,
    /// Extra attempts after a transport failure.
    pub retry: u32,
    pub timeout: Duration,
    /// Max requests in flight.
    pub worker_limit: usize,
    pub csv_separator: String,
    pub presets_separator: String,
    pub unknown_policy: UnknownPolicy,
    /// Upstream error messages that skip the query instead of failing the run.
    pub ignore_reasons: Vec<String>,
    pub log_period: Duration,
}

impl Config {
    /// Config with defaults for everything but the input file and endpoint. Output goes next to the input.
    pub fn new(queries_path: impl Into<PathBuf>, endpoint: Url) -> Self {
        let queries_path = queries_path.into();
        Self {
            output_dir: parent_dir(&queries_path),
            queries_path,
            endpoint,
            rps: Defaults::RPS,
            retry: Defaults::RETRY,
            timeout: Duration::from_secs(Defaults::TIMEOUT_SECS),
            worker_limit: Defaults::WORKER_LIMIT,
            csv_separator: Defaults::CSV_SEPARATOR.to_string(),
            presets_separator: Defaults::PRESETS_SEPARATOR.to_string(),
            unknown_policy: UnknownPolicy::default(),
            ignore_reasons: Vec::new(),
            log_period: Duration::from_millis(Defaults::LOG_PERIOD_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_for(dir: &Path) -> Settings {
        let queries = dir.join("queries.txt");
        std::fs::write(&queries, "a\n").unwrap();
        Settings {
            queries_path: Some(queries),
            endpoint: Some("http://match.local/api/v1/exactmatch?lang=ru".to_string()),
            ..Settings::default()
        }
    }

    #[test]
    fn defaults_validate_and_output_next_to_input() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = settings_for(tmp.path()).validate().unwrap();
        assert_eq!(cfg.output_dir, tmp.path());
        assert_eq!(cfg.csv_separator, "\t");
        assert_eq!(cfg.presets_separator, ",");
        assert_eq!(cfg.worker_limit, 100);
        assert_eq!(cfg.timeout, Duration::from_secs(3));
        assert_eq!(cfg.unknown_policy, UnknownPolicy::Skip);
    }

    #[test]
    fn validation_reports_every_problem() {
        let settings = Settings {
            queries_path: Some(PathBuf::from("/definitely/not/here.txt")),
            endpoint: Some("localhost".to_string()),
            rps: 0,
            timeout_secs: 0,
            worker_limit: 0,
            csv_separator: String::new(),
            ..Settings::default()
        };
        let Err(PipelineError::Config(problems)) = settings.validate() else {
            panic!("expected config error");
        };
        assert_eq!(problems.len(), 6, "{problems:?}");
    }

    #[test]
    fn endpoint_needs_scheme_and_host() {
        assert!(parse_endpoint("http://match.local/x").is_ok());
        assert!(parse_endpoint("ftp://match.local/x").is_err());
        assert!(parse_endpoint("/relative/path").is_err());
    }
}
