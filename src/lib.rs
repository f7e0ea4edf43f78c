//! Searchkind: classify search queries by what an exact-match service resolves them to,
//! and partition them into per-category output files.

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use error::*;
pub use types::*;
pub use utils::config::Config;

use log::debug;
use std::sync::Arc;

use pipeline::{ErrorFilter, HttpTransport, Shutdown, run_pipeline};

/// Single entry point: read `cfg.queries_path`, query the service over HTTP, and write one
/// folder per category under `cfg.output_dir`.
///
/// Upstream error messages listed in `cfg.ignore_reasons` skip the query; anything else stops
/// the run with the first root-cause error. Call [`Shutdown::trigger`] from another thread to
/// cancel; the result is then [`PipelineError::Aborted`] and rows written so far stay on disk.
///
/// Use [`run_pipeline`] directly to plug in a different [`Transport`](pipeline::Transport).
pub fn classify_queries(cfg: &Config, shutdown: &Shutdown) -> Result<RunSummary, PipelineError> {
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        cfg
    );
    let transport = Arc::new(HttpTransport::new(cfg.timeout)?);
    let filter = ErrorFilter::ignoring_messages(cfg.ignore_reasons.clone());
    run_pipeline(cfg, transport, filter, shutdown)
}
