//! Turn joined stage results into the single error reported for a run.

use log::debug;
use std::thread::JoinHandle;

use crate::error::PipelineError;

/// Join a stage thread, mapping a panic to [`PipelineError::WorkerPanicked`].
pub fn join_stage<T>(
    handle: JoinHandle<Result<T, PipelineError>>,
    stage: &'static str,
) -> Result<T, PipelineError> {
    handle
        .join()
        .map_err(|_| PipelineError::WorkerPanicked(stage))
        .and_then(|r| r)
}

/// Split stage errors from stage values. Root causes are kept in pipeline order; an abort is
/// reported only when no stage has a root cause.
pub fn check_stage_errors(errors: Vec<PipelineError>) -> Result<(), PipelineError> {
    for err in &errors {
        debug!("stage error: {}", err);
    }
    PipelineError::collect(errors).map_or(Ok(()), Err)
}
