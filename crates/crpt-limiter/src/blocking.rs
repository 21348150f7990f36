//! Thread-blocking sliding-window rate limiter.
//!
//! The same admission rules as [`RateLimiter`](crate::RateLimiter), for
//! callers on plain OS threads. Waiting uses a condition variable with a
//! timeout, which releases the state lock while asleep and lets a
//! [`CancelToken`] wake the waiter early.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use crate::clock::{Clock, MonotonicClock};
use crate::error::{LimitError, Result};
use crate::history::{Admission, History, WindowConfig};

#[derive(Debug)]
struct State {
    history: History,
    // FIFO tickets: only `serving` may evaluate the history.
    next_ticket: u64,
    serving: u64,
    abandoned: BTreeSet<u64>,
    shut_down: bool,
}

impl State {
    /// Hands the turn to the next ticket whose caller is still waiting.
    fn advance(&mut self) {
        self.serving += 1;
        while self.abandoned.remove(&self.serving) {
            self.serving += 1;
        }
    }

    fn leave(&mut self, ticket: u64) {
        if ticket == self.serving {
            self.advance();
        } else {
            self.abandoned.insert(ticket);
        }
    }
}

#[derive(Debug)]
struct Gate {
    state: Mutex<State>,
    wake: Condvar,
}

impl Gate {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("rate limiter state poisoned")
    }
}

#[derive(Debug, Default)]
struct Signal {
    cancelled: AtomicBool,
    // Every limiter this token has waited on, so `cancel` can wake them all.
    gates: Mutex<Vec<Weak<Gate>>>,
}

/// A cancellation signal for [`BlockingRateLimiter`] waits.
///
/// Clones share the same flag. Once cancelled it stays cancelled. A token
/// may be used with any number of limiters; cancelling it wakes waiters on
/// all of them.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    signal: Arc<Signal>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels every acquire waiting on this token, including ones that
    /// are currently asleep.
    pub fn cancel(&self) {
        self.signal.cancelled.store(true, Ordering::SeqCst);
        let gates: Vec<_> = self.gates().iter().filter_map(Weak::upgrade).collect();
        for gate in gates {
            // Taking the lock orders the store before any waiter's next check.
            let _state = gate.lock();
            gate.wake.notify_all();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.cancelled.load(Ordering::SeqCst)
    }

    /// Registers `gate` for wake-ups. Must run before the waiter first
    /// checks the flag under the gate lock.
    fn watch(&self, gate: &Arc<Gate>) {
        let mut gates = self.gates();
        gates.retain(|known| known.strong_count() > 0);
        if !gates.iter().any(|known| known.as_ptr() == Arc::as_ptr(gate)) {
            gates.push(Arc::downgrade(gate));
        }
    }

    fn gates(&self) -> MutexGuard<'_, Vec<Weak<Gate>>> {
        self.signal.gates.lock().expect("cancel token poisoned")
    }
}

/// Blocks threads so that at most `capacity` of them proceed in any
/// window of length `window`.
#[derive(Debug)]
pub struct BlockingRateLimiter<C: Clock = MonotonicClock> {
    config: WindowConfig,
    gate: Arc<Gate>,
    clock: C,
}

impl BlockingRateLimiter<MonotonicClock> {
    /// Creates a limiter allowing `capacity` admissions per `window`.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::InvalidConfiguration`] for a zero capacity or
    /// zero-length window.
    pub fn new(capacity: usize, window: Duration) -> Result<Self> {
        Self::with_clock(capacity, window, MonotonicClock)
    }
}

impl<C: Clock> BlockingRateLimiter<C> {
    pub fn with_clock(capacity: usize, window: Duration, clock: C) -> Result<Self> {
        let config = WindowConfig::new(capacity, window)?;
        Ok(Self {
            config,
            gate: Arc::new(Gate {
                state: Mutex::new(State {
                    history: History::new(config),
                    next_ticket: 0,
                    serving: 0,
                    abandoned: BTreeSet::new(),
                    shut_down: false,
                }),
                wake: Condvar::new(),
            }),
            clock,
        })
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    pub fn window(&self) -> Duration {
        self.config.window()
    }

    /// Creates a token already registered with this limiter.
    pub fn cancel_token(&self) -> CancelToken {
        let token = CancelToken::new();
        token.watch(&self.gate);
        token
    }

    /// Blocks until a slot is free and records an admission.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::Cancelled`] only if the limiter is shut down.
    pub fn acquire(&self) -> Result<()> {
        self.admit(None, None)
    }

    /// Blocks until a slot is free or `token` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::Cancelled`] if the token fires or the limiter
    /// shuts down first.
    pub fn acquire_with(&self, token: &CancelToken) -> Result<()> {
        self.admit(Some(token), None)
    }

    /// Blocks until a slot is free or `deadline` passes.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::Cancelled`] if the deadline passes first.
    pub fn acquire_until(&self, deadline: Instant) -> Result<()> {
        self.admit(None, Some(deadline))
    }

    /// Blocks at most `timeout` for a slot.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::Cancelled`] if `timeout` elapses first.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<()> {
        // A timeout past the end of representable time never expires.
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.acquire_until(deadline),
            None => self.admit(None, None),
        }
    }

    /// Releases every waiter with [`LimitError::Cancelled`]; later acquires
    /// fail immediately.
    pub fn shutdown(&self) {
        let mut state = self.gate.lock();
        if !state.shut_down {
            state.shut_down = true;
            log::info!("rate limiter shut down");
        }
        self.gate.wake.notify_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.gate.lock().shut_down
    }

    pub fn available(&self) -> usize {
        self.gate.lock().history.available_at(self.clock.now())
    }

    pub fn in_window(&self) -> usize {
        self.gate.lock().history.in_window_at(self.clock.now())
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.gate.lock().history.retry_after_at(self.clock.now())
    }

    fn admit(&self, token: Option<&CancelToken>, deadline: Option<Instant>) -> Result<()> {
        if let Some(token) = token {
            token.watch(&self.gate);
        }
        let mut state = self.gate.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;

        loop {
            let cancelled = token.is_some_and(CancelToken::is_cancelled);
            let expired = deadline.is_some_and(|d| Instant::now() >= d);
            if state.shut_down || cancelled || expired {
                state.leave(ticket);
                drop(state);
                self.gate.wake.notify_all();
                log::debug!("acquire cancelled before a slot was granted");
                return Err(LimitError::Cancelled);
            }

            let sleep_for = if ticket == state.serving {
                match state.history.admit_at(self.clock.now()) {
                    Admission::Granted => {
                        state.advance();
                        drop(state);
                        self.gate.wake.notify_all();
                        log::trace!("admission granted");
                        return Ok(());
                    }
                    Admission::Wait(wait) => {
                        log::debug!("rate limit reached, waiting {:?} for a free slot", wait);
                        Some(wait)
                    }
                }
            } else {
                None
            };

            // Never sleep past the caller's deadline.
            let until_deadline = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            let timeout = match (sleep_for, until_deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };

            state = match timeout {
                Some(timeout) => {
                    self.gate
                        .wake
                        .wait_timeout(state, timeout)
                        .expect("rate limiter state poisoned")
                        .0
                }
                None => self
                    .gate
                    .wake
                    .wait(state)
                    .expect("rate limiter state poisoned"),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::thread;

    #[test]
    fn test_new_rejects_invalid_configuration() {
        assert!(BlockingRateLimiter::new(0, Duration::from_secs(1)).is_err());
        assert!(BlockingRateLimiter::new(1, Duration::ZERO).is_err());
    }

    #[test]
    fn test_acquire_under_capacity_does_not_block() {
        let limiter = BlockingRateLimiter::new(4, Duration::from_secs(60)).unwrap();
        let start = Instant::now();

        for _ in 0..4 {
            limiter.acquire().unwrap();
        }

        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(limiter.available(), 0);
    }

    #[test]
    fn test_window_follows_injected_clock() {
        let clock = ManualClock::new();
        let limiter =
            BlockingRateLimiter::with_clock(2, Duration::from_secs(60), clock.clone()).unwrap();
        limiter.acquire().unwrap();
        clock.advance(Duration::from_secs(20));
        limiter.acquire().unwrap();

        assert_eq!(limiter.available(), 0);
        assert_eq!(limiter.retry_after(), Some(Duration::from_secs(40)));

        clock.advance(Duration::from_secs(40));
        assert_eq!(limiter.available(), 1);
        limiter.acquire().unwrap();
        assert_eq!(limiter.in_window(), 2);
        assert_eq!(limiter.retry_after(), Some(Duration::from_secs(20)));
    }

    #[test]
    fn test_timeout_records_nothing() {
        let limiter = BlockingRateLimiter::new(1, Duration::from_secs(60)).unwrap();
        limiter.acquire().unwrap();

        let start = Instant::now();
        let err = limiter
            .acquire_timeout(Duration::from_millis(50))
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(limiter.in_window(), 1);
    }

    #[test]
    fn test_cancel_interrupts_sleeping_waiter() {
        let limiter = Arc::new(BlockingRateLimiter::new(1, Duration::from_secs(3600)).unwrap());
        limiter.acquire().unwrap();
        let token = limiter.cancel_token();

        let waiter = {
            let limiter = Arc::clone(&limiter);
            let token = token.clone();
            thread::spawn(move || {
                let start = Instant::now();
                (limiter.acquire_with(&token), start.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(50));
        token.cancel();

        let (result, waited) = waiter.join().unwrap();
        assert_eq!(result, Err(LimitError::Cancelled));
        assert!(waited < Duration::from_secs(5));
        assert_eq!(limiter.in_window(), 1);
    }

    #[test]
    fn test_token_from_another_limiter_wakes_waiter() {
        let other = BlockingRateLimiter::new(1, Duration::from_secs(1)).unwrap();
        let limiter = Arc::new(BlockingRateLimiter::new(1, Duration::from_secs(3600)).unwrap());
        limiter.acquire().unwrap();
        let token = other.cancel_token();

        let waiter = {
            let limiter = Arc::clone(&limiter);
            let token = token.clone();
            thread::spawn(move || {
                let start = Instant::now();
                (limiter.acquire_with(&token), start.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(50));
        token.cancel();

        let (result, waited) = waiter.join().unwrap();
        assert_eq!(result, Err(LimitError::Cancelled));
        assert!(waited < Duration::from_secs(5));
        assert_eq!(limiter.in_window(), 1);
    }

    #[test]
    fn test_standalone_token_wakes_queued_waiter() {
        let limiter = Arc::new(BlockingRateLimiter::new(1, Duration::from_secs(3600)).unwrap());
        limiter.acquire().unwrap();
        let token = CancelToken::new();

        // Head of the queue, sleeping on the window timer.
        let head = {
            let limiter = Arc::clone(&limiter);
            thread::spawn(move || limiter.acquire_timeout(Duration::from_millis(300)))
        };
        thread::sleep(Duration::from_millis(20));

        // Behind the head, with no deadline of its own.
        let queued = {
            let limiter = Arc::clone(&limiter);
            let token = token.clone();
            thread::spawn(move || {
                let start = Instant::now();
                (limiter.acquire_with(&token), start.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        token.cancel();

        let (result, waited) = queued.join().unwrap();
        assert_eq!(result, Err(LimitError::Cancelled));
        assert!(waited < Duration::from_millis(250));
        assert_eq!(head.join().unwrap(), Err(LimitError::Cancelled));
    }

    #[test]
    fn test_unbounded_timeout_waits_without_overflow() {
        let limiter = BlockingRateLimiter::new(1, Duration::from_millis(50)).unwrap();
        limiter.acquire().unwrap();

        let start = Instant::now();
        assert_eq!(limiter.acquire_timeout(Duration::MAX), Ok(()));
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(limiter.in_window(), 1);
    }

    #[test]
    fn test_abandoned_ticket_does_not_block_successor() {
        let limiter = Arc::new(BlockingRateLimiter::new(1, Duration::from_millis(200)).unwrap());
        limiter.acquire().unwrap();
        let token = limiter.cancel_token();

        // Head of the queue: gives up.
        let quitter = {
            let limiter = Arc::clone(&limiter);
            let token = token.clone();
            thread::spawn(move || limiter.acquire_with(&token))
        };
        thread::sleep(Duration::from_millis(20));

        // Behind it: should still get the slot once it frees up.
        let patient = {
            let limiter = Arc::clone(&limiter);
            thread::spawn(move || limiter.acquire_timeout(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        token.cancel();

        assert_eq!(quitter.join().unwrap(), Err(LimitError::Cancelled));
        assert_eq!(patient.join().unwrap(), Ok(()));
    }

    #[test]
    fn test_shutdown_releases_waiters() {
        let limiter = Arc::new(BlockingRateLimiter::new(1, Duration::from_secs(3600)).unwrap());
        limiter.acquire().unwrap();

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let token = limiter.cancel_token();
                thread::spawn(move || limiter.acquire_with(&token))
            })
            .collect();
        thread::sleep(Duration::from_millis(50));
        limiter.shutdown();

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), Err(LimitError::Cancelled));
        }
        assert!(limiter.is_shut_down());
        assert_eq!(limiter.in_window(), 1);
    }
}
