use clap::Parser;
use std::path::PathBuf;

use crate::types::UnknownPolicy;
use crate::utils::config::{Settings, WORKER_LIMIT_ENV};

/// Classify search queries by what the matching service resolves them to.
///
/// Every option left unset falls back to the settings file, then to the built-in default.
#[derive(Clone, Debug, Parser)]
#[command(name = "searchkind")]
#[command(about = "Classify search queries into preset, extend-search and merger buckets.")]
pub struct Cli {
    /// File with one query per line.
    #[arg(long, short = 'q', value_name = "FILE")]
    pub queries: Option<PathBuf>,

    /// Base URL of the exact-match service.
    #[arg(long, short = 'u', value_name = "URL")]
    pub url: Option<String>,

    /// Requests per second. Default: 1.
    #[arg(long, short = 'r', value_parser = clap::value_parser!(u32))]
    pub rps: Option<u32>,

    /// Extra attempts after a transport failure. Default: 0.
    #[arg(long, value_parser = clap::value_parser!(u32))]
    pub retry: Option<u32>,

    /// Per-request timeout in seconds. Default: 3.
    #[arg(long, value_parser = clap::value_parser!(u64))]
    pub timeout_secs: Option<u64>,

    /// Max requests in flight. Capped by the open file limit. Default: 100.
    #[arg(long, short = 'w', env = WORKER_LIMIT_ENV, value_parser = clap::value_parser!(usize))]
    pub workers: Option<usize>,

    /// Field separator in queries.csv. Default: tab.
    #[arg(long, value_name = "SEP")]
    pub csv_separator: Option<String>,

    /// Separator between preset ids in list.presets. Default: ",".
    #[arg(long, value_name = "SEP")]
    pub presets_separator: Option<String>,

    /// Directory for the category folders. Default: directory of the queries file.
    #[arg(long, short = 'o', value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// What to do with queries that fit no category.
    #[arg(long, value_enum)]
    pub unknown: Option<UnknownArg>,

    /// Upstream error message that skips the query instead of failing the run. Repeatable.
    #[arg(long = "ignore-reason", value_name = "MESSAGE")]
    pub ignore_reasons: Vec<String>,

    /// How often buffered log lines are written, in milliseconds. Default: 3000.
    #[arg(long, value_parser = clap::value_parser!(u64))]
    pub log_period_ms: Option<u64>,

    /// Settings file. Default: `searchkind.toml` in the working directory, if present.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum UnknownArg {
    Skip,
    Fail,
}

impl From<UnknownArg> for UnknownPolicy {
    fn from(arg: UnknownArg) -> Self {
        match arg {
            UnknownArg::Skip => UnknownPolicy::Skip,
            UnknownArg::Fail => UnknownPolicy::Fail,
        }
    }
}

impl Cli {
    /// Overwrite `settings` with every option given on the command line.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(ref p) = self.queries {
            settings.queries_path = Some(p.clone());
        }
        if let Some(ref p) = self.output_dir {
            settings.output_dir = Some(p.clone());
        }
        if let Some(ref u) = self.url {
            settings.endpoint = Some(u.clone());
        }
        if let Some(v) = self.rps {
            settings.rps = v;
        }
        if let Some(v) = self.retry {
            settings.retry = v;
        }
        if let Some(v) = self.timeout_secs {
            settings.timeout_secs = v;
        }
        if let Some(v) = self.workers {
            settings.worker_limit = v;
        }
        if let Some(ref s) = self.csv_separator {
            settings.csv_separator = s.clone();
        }
        if let Some(ref s) = self.presets_separator {
            settings.presets_separator = s.clone();
        }
        if let Some(u) = self.unknown {
            settings.unknown_policy = u.into();
        }
        if !self.ignore_reasons.is_empty() {
            settings.ignore_reasons = self.ignore_reasons.clone();
        }
        if let Some(v) = self.log_period_ms {
            settings.log_period_ms = v;
        }
        if let Some(v) = self.verbose {
            settings.verbose = v;
        }
    }
}
