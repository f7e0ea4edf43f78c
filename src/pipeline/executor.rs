//! Request executor: paced intake of queries, bounded pool of request workers, validated bodies out.

use crossbeam_channel::{Receiver, Sender, after, bounded, select};
use log::{debug, info};
use serde::Deserialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use url::Url;

use crate::error::PipelineError;
use crate::utils::config::Config;

use super::rate_limit::RateLimiter;
use super::shutdown::Shutdown;
use super::transport::{HttpResponse, Transport};

const QUERY_PARAM: &str = "query";

/// Pause between attempts after a transport failure.
pub const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Decides which upstream failures only skip their query.
pub struct ErrorFilter {
    predicate: Box<dyn Fn(&PipelineError) -> bool + Send + Sync>,
}

impl ErrorFilter {
    /// Nothing is benign.
    pub fn strict() -> Self {
        Self::new(|_| false)
    }

    pub fn new(predicate: impl Fn(&PipelineError) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
        }
    }

    /// Skip application errors (non-zero `code`) and non-2xx answers whose message is one of `reasons`.
    pub fn ignoring_messages<I, S>(reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let reasons: Vec<String> = reasons.into_iter().map(Into::into).collect();
        if reasons.is_empty() {
            return Self::strict();
        }
        Self::new(move |err| match err {
            PipelineError::BadResponseBody { message, .. } => {
                reasons.iter().any(|r| r == message.trim())
            }
            PipelineError::BadResponseStatus { body, .. } => {
                reasons.iter().any(|r| r == body.trim())
            }
            _ => false,
        })
    }

    pub fn is_benign(&self, err: &PipelineError) -> bool {
        (self.predicate)(err)
    }
}

/// Application-level error carried in a 2xx answer.
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    error: String,
}

/// Check status and envelope; hand back the body for classification.
pub fn check_response(response: HttpResponse) -> Result<Vec<u8>, PipelineError> {
    if !response.is_success() {
        return Err(PipelineError::BadResponseStatus {
            status: response.status,
            body: String::from_utf8_lossy(&response.body).into_owned(),
        });
    }
    let envelope: Envelope = serde_json::from_slice(&response.body)
        .map_err(|e| PipelineError::Decode(e.to_string()))?;
    if envelope.code != 0 {
        return Err(PipelineError::BadResponseBody {
            code: envelope.code,
            message: envelope.error,
        });
    }
    Ok(response.body)
}

/// `base` with its `query` parameter set to `query`; other parameters are kept in order.
pub fn build_request_url(base: &Url, query: &str) -> Url {
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != QUERY_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(QUERY_PARAM, query);
    url
}

struct Job {
    query: String,
    url: Url,
}

/// Shared by all workers of one run.
struct WorkerShared<T> {
    transport: Arc<T>,
    filter: Arc<ErrorFilter>,
    retry: u32,
    retry_delay: Duration,
    skipped: AtomicUsize,
}

impl<T: Transport> WorkerShared<T> {
    /// GET with up to `retry` extra attempts on transport failure. Status errors are not retried.
    fn fetch(&self, url: &Url, shutdown: &Shutdown) -> Result<HttpResponse, PipelineError> {
        let mut attempt = 0_u32;
        loop {
            match self.transport.get(url) {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.retry && !shutdown.is_triggered() => {
                    attempt += 1;
                    debug!("retry {}/{} after: {}", attempt, self.retry, err);
                    let cancelled = select! {
                        recv(after(self.retry_delay)) -> _ => false,
                        recv(shutdown.done()) -> _ => true,
                    };
                    if cancelled {
                        return Err(err.into());
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// `Ok(None)` means the query was skipped as benign.
    fn process(&self, job: &Job, shutdown: &Shutdown) -> Result<Option<Vec<u8>>, PipelineError> {
        match self.fetch(&job.url, shutdown).and_then(check_response) {
            Ok(body) => Ok(Some(body)),
            Err(err) if self.filter.is_benign(&err) => {
                info!("Query {:?} skipped: {}", job.query, err);
                self.skipped.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// Take jobs until the job queue closes or shutdown fires.
fn drain_jobs<T: Transport>(
    shared: &WorkerShared<T>,
    job_rx: &Receiver<Job>,
    bodies: &Sender<Vec<u8>>,
    shutdown: &Shutdown,
) -> Result<(), PipelineError> {
    loop {
        let job = select! {
            recv(job_rx) -> msg => match msg {
                Ok(job) => job,
                Err(_) => return Ok(()),
            },
            recv(shutdown.done()) -> _ => return Err(PipelineError::Aborted),
        };
        let Some(body) = shared.process(&job, shutdown)? else {
            continue;
        };
        select! {
            send(bodies, body) -> res => res.map_err(|_| PipelineError::Aborted)?,
            recv(shutdown.done()) -> _ => return Err(PipelineError::Aborted),
        }
        debug!("Query {:?} answered", job.query);
    }
}

/// Single request worker. Any root-cause error, a panic included, fires shutdown so siblings,
/// intake and sink unwind.
fn request_worker_loop<T: Transport>(
    shared: Arc<WorkerShared<T>>,
    job_rx: Receiver<Job>,
    bodies: Sender<Vec<u8>>,
    shutdown: Shutdown,
) -> Result<(), PipelineError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        drain_jobs(&shared, &job_rx, &bodies, &shutdown)
    }))
    .unwrap_or(Err(PipelineError::WorkerPanicked("request worker")));
    drop(bodies);
    if let Err(ref err) = result
        && !err.is_abort()
        && shutdown.trigger()
    {
        debug!("request worker fired shutdown: {}", err);
    }
    result
}

/// Spawn `count` request workers draining `job_rx`. Caller drops its job sender to let them exit.
fn spawn_request_workers<T: Transport + 'static>(
    shared: &Arc<WorkerShared<T>>,
    job_rx: &Receiver<Job>,
    bodies: &Sender<Vec<u8>>,
    shutdown: &Shutdown,
    count: usize,
) -> Vec<JoinHandle<Result<(), PipelineError>>> {
    (0..count)
        .map(|_| {
            let shared = Arc::clone(shared);
            let job_rx = job_rx.clone();
            let bodies = bodies.clone();
            let shutdown = shutdown.clone();
            thread::spawn(move || request_worker_loop(shared, job_rx, bodies, shutdown))
        })
        .collect()
}

/// What the executor did in a finished run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorStats {
    pub dispatched: usize,
    pub skipped_benign: usize,
}

/// Paced, bounded-concurrency request stage.
pub struct RequestExecutor<T> {
    endpoint: Url,
    limiter: RateLimiter,
    workers: usize,
    shared: Arc<WorkerShared<T>>,
}

impl<T: Transport + 'static> RequestExecutor<T> {
    pub fn new(cfg: &Config, transport: Arc<T>, filter: Arc<ErrorFilter>, workers: usize) -> Self {
        Self {
            endpoint: cfg.endpoint.clone(),
            limiter: RateLimiter::per_second(cfg.rps),
            workers: workers.max(1),
            shared: Arc::new(WorkerShared {
                transport,
                filter,
                retry: cfg.retry,
                retry_delay: RETRY_DELAY,
                skipped: AtomicUsize::new(0),
            }),
        }
    }

    /// Consume `queries` until it closes, sending validated bodies to `bodies`.
    ///
    /// `bodies` is dropped (closing the stream) when this returns. Returns
    /// [`PipelineError::Aborted`] when shutdown fired and no worker reported a root cause.
    pub fn run(
        self,
        queries: Receiver<String>,
        bodies: Sender<Vec<u8>>,
        shutdown: &Shutdown,
    ) -> Result<ExecutorStats, PipelineError> {
        let (job_tx, job_rx) = bounded::<Job>(0);
        let workers = spawn_request_workers(&self.shared, &job_rx, &bodies, shutdown, self.workers);
        drop(job_rx);
        drop(bodies);
        debug!("Started {} request workers", self.workers);

        let mut dispatched = 0_usize;
        let mut aborted = false;
        loop {
            let next = select! {
                recv(queries) -> msg => msg.ok(),
                recv(shutdown.done()) -> _ => {
                    aborted = true;
                    None
                }
            };
            let Some(query) = next else {
                break;
            };
            let Ok(permit) = self.limiter.acquire(shutdown) else {
                aborted = true;
                break;
            };
            debug!(
                "Permit for {:?} waited {:?} in intake",
                query,
                permit.issued_at.elapsed()
            );
            let job = Job {
                url: build_request_url(&self.endpoint, &query),
                query,
            };
            let sent = select! {
                send(job_tx, job) -> res => res.is_ok(),
                recv(shutdown.done()) -> _ => false,
            };
            if !sent {
                aborted = true;
                break;
            }
            dispatched += 1;
        }
        drop(job_tx);

        let mut errors = Vec::new();
        for h in workers {
            match h.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => errors.push(err),
                Err(_) => {
                    shutdown.trigger();
                    errors.push(PipelineError::WorkerPanicked("request worker"));
                }
            }
        }
        if aborted {
            errors.push(PipelineError::Aborted);
        }
        info!("Executor has finished ({} queries dispatched)", dispatched);

        match PipelineError::collect(errors) {
            Some(err) => Err(err),
            None => Ok(ExecutorStats {
                dispatched,
                skipped_benign: self.shared.skipped.load(Ordering::Relaxed),
            }),
        }
    }
}
