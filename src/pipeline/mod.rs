//! Pipeline components: reader, request executor, classifier, partitioned sink, and the
//! shutdown signal tying them together.

pub mod classify;
pub mod context;
pub mod error_handler;
pub mod executor;
pub mod orchestrator;
pub mod rate_limit;
pub mod reader;
pub mod saver;
pub mod shutdown;
pub mod transport;

pub use classify::{classify, parse_catalog_value};
pub use context::{PipelineChannels, PipelineHandles, STAGE_QUEUE_CAP, create_pipeline_channels};
pub use error_handler::{check_stage_errors, join_stage};
pub use executor::{ErrorFilter, ExecutorStats, RequestExecutor, build_request_url, check_response};
pub use orchestrator::{run_pipeline, spawn_stages};
pub use rate_limit::{Cancelled, Permit, RateLimiter};
pub use reader::read_queries;
pub use saver::{
    Accepted, PartitionedSink, SinkSettings, SinkStats, category_dir, read_preset_list,
};
pub use shutdown::Shutdown;
pub use transport::{HttpResponse, HttpTransport, Transport};
