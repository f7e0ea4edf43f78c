use crossbeam_channel::Receiver;
use log::{debug, info};
use std::sync::Arc;
use std::thread;

use crate::error::PipelineError;
use crate::types::RunSummary;
use crate::utils::config::Config;
use crate::utils::fd_limit::effective_worker_limit;

use super::context::{PipelineChannels, PipelineHandles, create_pipeline_channels};
use super::error_handler::{check_stage_errors, join_stage};
use super::executor::{ErrorFilter, RequestExecutor};
use super::reader::read_queries;
use super::saver::{PartitionedSink, SinkSettings};
use super::shutdown::Shutdown;
use super::transport::Transport;

/// Start the reader and executor threads. Returns their handles and the body stream the caller
/// must drain.
pub fn spawn_stages<T: Transport + 'static>(
    cfg: &Config,
    transport: Arc<T>,
    filter: ErrorFilter,
    channels: PipelineChannels,
    shutdown: &Shutdown,
) -> (PipelineHandles, Receiver<Vec<u8>>) {
    let PipelineChannels {
        queries_tx,
        queries_rx,
        bodies_tx,
        bodies_rx,
    } = channels;

    let workers = effective_worker_limit(cfg.worker_limit);
    debug!("Request workers: {}", workers);

    let reader_handle = {
        let path = cfg.queries_path.clone();
        let shutdown = shutdown.clone();
        thread::spawn(move || {
            let result = read_queries(&path, queries_tx, &shutdown);
            if let Err(ref err) = result
                && !err.is_abort()
            {
                shutdown.trigger();
            }
            result
        })
    };

    let executor = RequestExecutor::new(cfg, transport, Arc::new(filter), workers);
    let executor_handle = {
        let shutdown = shutdown.clone();
        thread::spawn(move || executor.run(queries_rx, bodies_tx, &shutdown))
    };

    (
        PipelineHandles {
            reader_handle,
            executor_handle,
        },
        bodies_rx,
    )
}

/// Main orchestrator: reader → executor → sink, all connected by synchronous queues.
///
/// The sink is created before any request goes out, so an unwritable output directory fails the
/// run up front. The first root-cause error from any stage fires `shutdown`; every stage is then
/// joined and their errors folded by [`check_stage_errors`]. Rows written before a failure stay on disk.
pub fn run_pipeline<T: Transport + 'static>(
    cfg: &Config,
    transport: Arc<T>,
    filter: ErrorFilter,
    shutdown: &Shutdown,
) -> Result<RunSummary, PipelineError> {
    let sink = PartitionedSink::create(SinkSettings::from(cfg))?;

    let (handles, bodies_rx) =
        spawn_stages(cfg, transport, filter, create_pipeline_channels(), shutdown);
    let PipelineHandles {
        reader_handle,
        executor_handle,
    } = handles;

    let sink_result = sink.run(bodies_rx, shutdown);
    let reader_result = join_stage(reader_handle, "reader");
    let executor_result = join_stage(executor_handle, "executor");

    let mut errors = Vec::new();
    let read = reader_result.map_err(|e| errors.push(e)).ok();
    let executed = executor_result.map_err(|e| errors.push(e)).ok();
    let saved = sink_result.map_err(|e| errors.push(e)).ok();
    check_stage_errors(errors)?;

    let (Some(read), Some(executed), Some(saved)) = (read, executed, saved) else {
        return Err(PipelineError::Aborted);
    };
    let summary = RunSummary {
        written: saved.written,
        skipped_unknown: saved.skipped_unknown,
        skipped_benign: executed.skipped_benign,
    };
    info!(
        "Done: {} queries read, {} dispatched, {} written, {} unknown skipped, {} benign errors skipped",
        read,
        executed.dispatched,
        summary.total_written(),
        summary.skipped_unknown,
        summary.skipped_benign
    );
    Ok(summary)
}
