//! Fixed-period pacing of outbound requests.

use crossbeam_channel::{Receiver, select, tick};
use std::time::{Duration, Instant};

use super::shutdown::Shutdown;

/// Authorization to issue one request.
#[derive(Debug, Clone, Copy)]
pub struct Permit {
    pub issued_at: Instant,
}

/// Returned by [`RateLimiter::acquire`] when shutdown fired first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Hands out one permit per period (`1 / rps`).
///
/// Backed by a ticker channel of capacity one: idle time never banks more than a single permit.
pub struct RateLimiter {
    ticker: Receiver<Instant>,
    period: Duration,
}

impl RateLimiter {
    /// Caller guarantees `rps > 0` (checked by config validation).
    pub fn per_second(rps: u32) -> Self {
        Self::with_period(Duration::from_secs(1) / rps.max(1))
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            ticker: tick(period),
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Block until the next tick or until shutdown fires.
    pub fn acquire(&self, shutdown: &Shutdown) -> Result<Permit, Cancelled> {
        if shutdown.is_triggered() {
            return Err(Cancelled);
        }
        select! {
            recv(self.ticker) -> at => match at {
                Ok(issued_at) => Ok(Permit { issued_at }),
                Err(_) => Err(Cancelled),
            },
            recv(shutdown.done()) -> _ => Err(Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn permits_are_spaced_by_period() {
        let limiter = RateLimiter::with_period(Duration::from_millis(20));
        let shutdown = Shutdown::new();
        let start = Instant::now();
        let issued: Vec<Instant> = (0..5)
            .map(|_| limiter.acquire(&shutdown).unwrap().issued_at)
            .collect();
        assert!(start.elapsed() >= Duration::from_millis(95));
        for pair in issued.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn idle_time_does_not_bank_a_burst() {
        let limiter = RateLimiter::with_period(Duration::from_millis(20));
        let shutdown = Shutdown::new();
        thread::sleep(Duration::from_millis(150));
        let start = Instant::now();
        for _ in 0..4 {
            limiter.acquire(&shutdown).unwrap();
        }
        // one pending tick at most; the other three wait a full period each
        assert!(start.elapsed() >= Duration::from_millis(55));
    }

    #[test]
    fn acquire_returns_cancelled_on_shutdown() {
        let limiter = RateLimiter::with_period(Duration::from_secs(60));
        let shutdown = Shutdown::new();
        let trigger = {
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                shutdown.trigger();
            })
        };
        let start = Instant::now();
        assert_eq!(limiter.acquire(&shutdown).unwrap_err(), Cancelled);
        assert!(start.elapsed() < Duration::from_secs(5));
        trigger.join().unwrap();
        assert_eq!(limiter.acquire(&shutdown).unwrap_err(), Cancelled);
    }

    #[test]
    fn per_second_period() {
        assert_eq!(RateLimiter::per_second(4).period(), Duration::from_millis(250));
    }
}
