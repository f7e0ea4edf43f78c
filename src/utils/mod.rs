pub mod config;
pub mod fd_limit;
pub mod logger;
pub(crate) mod settings_file;

pub use config::*;
pub use fd_limit::{FDS_PER_WORKER, effective_worker_limit, max_open_fds, max_workers_by_fd_limit};
pub use logger::{BatchedLogger, LoggerGuard, setup_logging};
