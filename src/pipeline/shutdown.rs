//! Shared shutdown signal observed by every blocking point of the pipeline.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

struct Inner {
    fired: AtomicBool,
    tx: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

/// Cloneable cancellation token. [`Shutdown::trigger`] is idempotent; the first call wins.
///
/// [`Shutdown::done`] is a channel that never carries a message and becomes ready (disconnected)
/// once triggered, so it can sit in any `crossbeam_channel::select!` next to a send or receive.
#[derive(Clone)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = bounded::<()>(0);
        Self {
            inner: Arc::new(Inner {
                fired: AtomicBool::new(false),
                tx: Mutex::new(Some(tx)),
                rx,
            }),
        }
    }

    /// Fire the signal. Returns true only for the call that actually fired it.
    pub fn trigger(&self) -> bool {
        if self.inner.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        drop(
            self.inner
                .tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    /// Ready once triggered; select on it with `recv(shutdown.done()) -> _`.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.rx
    }

    /// Trigger on SIGINT, SIGTERM or SIGHUP. Can only be installed once per process.
    pub fn trigger_on_ctrlc(&self) -> Result<(), ctrlc::Error> {
        let shutdown = self.clone();
        ctrlc::set_handler(move || {
            if shutdown.trigger() {
                log::warn!("Interrupt received; stopping pipeline");
            }
        })
    }
}
