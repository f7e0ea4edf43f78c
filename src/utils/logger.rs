//! Logging: `env_logger` formatting behind a buffer that is printed on a fixed period.
//!
//! Stages log through the `log` facade from any thread; records pile up in [`BatchedLogger`]
//! and a ticker thread hands them to the wrapped logger every period, so console output comes
//! in batches instead of interleaving with request traffic.

use colored::Colorize;
use crossbeam_channel::{Sender, bounded, select, tick};
use env_logger::Builder;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct Buffered {
    level: Level,
    target: String,
    message: String,
}

/// Buffers records and forwards them to `inner` on [`BatchedLogger::drain`].
pub struct BatchedLogger {
    inner: Box<dyn Log>,
    buffer: Mutex<Vec<Buffered>>,
}

impl BatchedLogger {
    pub fn new(inner: Box<dyn Log>) -> Self {
        Self {
            inner,
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Number of records waiting for the next drain.
    pub fn pending(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Forward everything buffered so far to the wrapped logger. Returns how many records were written.
    pub fn drain(&self) -> usize {
        let batch = std::mem::take(
            &mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for b in &batch {
            self.inner.log(
                &Record::builder()
                    .level(b.level)
                    .target(&b.target)
                    .args(format_args!("{}", b.message))
                    .build(),
            );
        }
        self.inner.flush();
        batch.len()
    }
}

impl Log for BatchedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Buffered {
                level: record.level(),
                target: record.target().to_string(),
                message: record.args().to_string(),
            });
    }

    fn flush(&self) {
        self.drain();
    }
}

/// Keeps the periodic flusher alive. Dropping it stops the flusher and prints what is left.
pub struct LoggerGuard {
    logger: Option<&'static BatchedLogger>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
        if let Some(logger) = self.logger {
            logger.drain();
        }
    }
}

fn console_logger(verbose: bool) -> env_logger::Logger {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::from_default_env()
        .filter_level(LevelFilter::Warn) // Default: only warnings from dependencies
        .filter_module(env!("CARGO_PKG_NAME"), level) // Our crate: use requested level
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME");
            let level_str = match record.level() {
                Level::Warn => Some("WARN".yellow()),
                Level::Error => Some("ERROR".red()),
                _ => None,
            };
            let line = match level_str {
                Some(level_str) => {
                    let path = record.target().to_string().white();
                    format!("[{} {} {}] {}", name.cyan(), level_str, path, record.args())
                }
                None => format!("[{}] {}", name.cyan(), record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .build()
}

/// Install the batched console logger and start its flusher. Keep the guard until exit.
pub fn setup_logging(verbose: bool, period: Duration) -> LoggerGuard {
    let console = console_logger(verbose);
    let max_level = console.filter();
    let logger: &'static BatchedLogger = Box::leak(Box::new(BatchedLogger::new(Box::new(console))));
    if log::set_logger(logger).is_err() {
        return LoggerGuard {
            logger: None,
            stop_tx: None,
            handle: None,
        };
    }
    log::set_max_level(max_level);

    let (stop_tx, stop_rx) = bounded::<()>(0);
    let handle = thread::spawn(move || {
        let ticker = tick(period);
        loop {
            select! {
                recv(ticker) -> _ => {
                    logger.drain();
                }
                recv(stop_rx) -> _ => break,
            }
        }
    });

    LoggerGuard {
        logger: Some(logger),
        stop_tx: Some(stop_tx),
        handle: Some(handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Default)]
    struct Capture {
        lines: Arc<Mutex<Vec<String>>>,
    }

    impl Log for Capture {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= Level::Info
        }

        fn log(&self, record: &Record) {
            self.lines
                .lock()
                .unwrap()
                .push(format!("{} {}", record.level(), record.args()));
        }

        fn flush(&self) {}
    }

    #[test]
    fn records_wait_for_drain() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let logger = BatchedLogger::new(Box::new(Capture {
            lines: Arc::clone(&lines),
        }));

        logger.log(
            &Record::builder()
                .level(Level::Info)
                .target("searchkind")
                .args(format_args!("query {:?} has finished", "a"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .level(Level::Debug)
                .target("searchkind")
                .args(format_args!("filtered out"))
                .build(),
        );

        assert_eq!(logger.pending(), 1);
        assert!(lines.lock().unwrap().is_empty());

        assert_eq!(logger.drain(), 1);
        assert_eq!(logger.pending(), 0);
        assert_eq!(
            lines.lock().unwrap().as_slice(),
            ["INFO query \"a\" has finished"]
        );
    }

    #[test]
    fn concurrent_appends_are_all_kept() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let logger = Arc::new(BatchedLogger::new(Box::new(Capture {
            lines: Arc::clone(&lines),
        })));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let logger = Arc::clone(&logger);
                thread::spawn(move || {
                    for j in 0..50 {
                        logger.log(
                            &Record::builder()
                                .level(Level::Info)
                                .args(format_args!("{i}-{j}"))
                                .build(),
                        );
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(logger.drain(), 400);
        assert_eq!(lines.lock().unwrap().len(), 400);
    }
}
