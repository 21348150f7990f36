//! Async sliding-window rate limiter.

use std::future::{self, Future};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::clock::{Clock, TokioClock};
use crate::error::{LimitError, Result};
use crate::history::{Admission, History, WindowConfig};

/// Blocks tasks so that at most `capacity` of them proceed in any window
/// of length `window`.
///
/// Waiters are served in arrival order. Only the task at the head of the
/// queue sleeps on a timer; the history lock is held just long enough to
/// evaluate and record an admission, never across an `.await`.
///
/// Share it between tasks with an `Arc`.
#[derive(Debug)]
pub struct RateLimiter<C: Clock = TokioClock> {
    config: WindowConfig,
    history: Mutex<History>,
    // tokio's mutex queues waiters fairly, which gives FIFO admission.
    queue: tokio::sync::Mutex<()>,
    shutdown: watch::Sender<bool>,
    clock: C,
}

impl RateLimiter<TokioClock> {
    /// Creates a limiter allowing `capacity` admissions per `window`.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::InvalidConfiguration`] for a zero capacity or
    /// zero-length window.
    pub fn new(capacity: usize, window: Duration) -> Result<Self> {
        Self::with_clock(capacity, window, TokioClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Creates a limiter that reads time from `clock`.
    ///
    /// Waiting is done with tokio timers, so `clock` should advance at the
    /// same rate as tokio time. A waiter re-reads `clock` only when its
    /// timer fires: with a [`ManualClock`](crate::ManualClock) nobody
    /// advances, it re-sleeps for the same wait forever.
    pub fn with_clock(capacity: usize, window: Duration, clock: C) -> Result<Self> {
        let config = WindowConfig::new(capacity, window)?;
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            config,
            history: Mutex::new(History::new(config)),
            queue: tokio::sync::Mutex::new(()),
            shutdown,
            clock,
        })
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    pub fn window(&self) -> Duration {
        self.config.window()
    }

    /// Waits for a free slot and records an admission.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::Cancelled`] only if the limiter is shut down.
    pub async fn acquire(&self) -> Result<()> {
        self.acquire_or_cancel(future::pending::<()>()).await
    }

    /// Waits for a free slot unless `cancel` resolves first.
    ///
    /// Cancellation interrupts both queueing and sleeping. A cancelled
    /// call records nothing.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::Cancelled`] if `cancel` resolves or the
    /// limiter is shut down before a slot is granted.
    pub async fn acquire_or_cancel<F>(&self, cancel: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = self.shutdown.subscribe();
        let stop = async move {
            tokio::select! {
                () = cancel => log::debug!("acquire cancelled by caller"),
                _ = shutdown.wait_for(|closed| *closed) => log::debug!("acquire cancelled by shutdown"),
            }
        };
        tokio::pin!(stop);

        let _turn = tokio::select! {
            biased;
            () = &mut stop => return Err(LimitError::Cancelled),
            turn = self.queue.lock() => turn,
        };

        loop {
            let wait = match self.lock_history().admit_at(self.clock.now()) {
                Admission::Granted => {
                    log::trace!("admission granted");
                    return Ok(());
                }
                Admission::Wait(wait) => wait,
            };

            log::debug!("rate limit reached, waiting {:?} for a free slot", wait);
            tokio::select! {
                biased;
                () = &mut stop => return Err(LimitError::Cancelled),
                () = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Waits for a free slot until `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::Cancelled`] if the deadline passes first.
    pub async fn acquire_until(&self, deadline: Instant) -> Result<()> {
        self.acquire_or_cancel(tokio::time::sleep_until(deadline.into()))
            .await
    }

    /// Waits at most `timeout` for a free slot.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::Cancelled`] if `timeout` elapses first.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<()> {
        self.acquire_or_cancel(tokio::time::sleep(timeout)).await
    }

    /// Releases every waiter with [`LimitError::Cancelled`]; later acquires
    /// fail immediately.
    pub fn shutdown(&self) {
        if !self.shutdown.send_replace(true) {
            log::info!("rate limiter shut down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Slots that could be granted right now without waiting.
    pub fn available(&self) -> usize {
        self.lock_history().available_at(self.clock.now())
    }

    /// Admissions counted against the current window.
    pub fn in_window(&self) -> usize {
        self.lock_history().in_window_at(self.clock.now())
    }

    /// How long the next admission would wait, or `None` if a slot is free.
    ///
    /// Does not account for tasks already queued.
    pub fn retry_after(&self) -> Option<Duration> {
        self.lock_history().retry_after_at(self.clock.now())
    }

    fn lock_history(&self) -> MutexGuard<'_, History> {
        self.history.lock().expect("rate limiter history poisoned")
    }
}
