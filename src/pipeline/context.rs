//! Pipeline channels and thread handles shared between the orchestrator and its stages.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::thread::JoinHandle;

use crate::error::PipelineError;

use super::executor::ExecutorStats;

/// Capacity of every stage-to-stage queue. Zero means each send waits for the receiver,
/// so a slow stage holds back the ones before it.
pub const STAGE_QUEUE_CAP: usize = 0;

/// Reader → executor carries query strings; executor → sink carries validated response bodies.
pub struct PipelineChannels {
    pub queries_tx: Sender<String>,
    pub queries_rx: Receiver<String>,
    pub bodies_tx: Sender<Vec<u8>>,
    pub bodies_rx: Receiver<Vec<u8>>,
}

pub fn create_pipeline_channels() -> PipelineChannels {
    let (queries_tx, queries_rx) = bounded::<String>(STAGE_QUEUE_CAP);
    let (bodies_tx, bodies_rx) = bounded::<Vec<u8>>(STAGE_QUEUE_CAP);
    PipelineChannels {
        queries_tx,
        queries_rx,
        bodies_tx,
        bodies_rx,
    }
}

/// Threads started by [`run_pipeline`](super::run_pipeline); the sink runs on the caller's thread.
pub struct PipelineHandles {
    pub reader_handle: JoinHandle<Result<usize, PipelineError>>,
    pub executor_handle: JoinHandle<Result<ExecutorStats, PipelineError>>,
}
