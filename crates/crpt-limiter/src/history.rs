//! Admission history for the sliding window.
//!
//! [`History`] is pure bookkeeping: every method takes the current instant
//! explicitly, so it can be driven by any [`Clock`](crate::Clock) and
//! tested without sleeping. Callers provide the locking.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::{LimitError, Result};

/// "At most `capacity` admissions in any window of length `window`."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    capacity: usize,
    window: Duration,
}

impl WindowConfig {
    /// Validates and builds a window configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::InvalidConfiguration`] when `capacity` is zero
    /// or `window` is zero-length.
    pub fn new(capacity: usize, window: Duration) -> Result<Self> {
        if capacity == 0 || window.is_zero() {
            return Err(LimitError::InvalidConfiguration { capacity, window });
        }
        Ok(Self { capacity, window })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Outcome of asking the history for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was granted and recorded.
    Granted,
    /// The window is full; the oldest record ages out after this long.
    Wait(Duration),
}

/// Timestamps of the most recent admissions, oldest first.
///
/// Never holds more than `capacity` records. A record at exactly
/// `now - window` has aged out, so the counted window is `(now - window, now]`.
#[derive(Debug)]
pub struct History {
    config: WindowConfig,
    records: VecDeque<Instant>,
}

impl History {
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            records: VecDeque::with_capacity(config.capacity),
        }
    }

    pub fn config(&self) -> WindowConfig {
        self.config
    }

    /// Number of records held, aged out or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Grants a slot at `now` if the window allows it.
    ///
    /// When the buffer is full the oldest record is evicted in the same
    /// step as the new one is inserted. A refused admission leaves the
    /// history untouched.
    pub fn admit_at(&mut self, now: Instant) -> Admission {
        // Keep insertion order chronological even if a clock misbehaves.
        let now = match self.records.back() {
            Some(&newest) if now < newest => newest,
            _ => now,
        };

        if self.records.len() < self.config.capacity {
            self.records.push_back(now);
            return Admission::Granted;
        }

        match self.wait_for_oldest(now) {
            Some(wait) => Admission::Wait(wait),
            None => {
                self.records.pop_front();
                self.records.push_back(now);
                Admission::Granted
            }
        }
    }

    /// Admissions whose timestamp lies inside the window ending at `now`.
    pub fn in_window_at(&self, now: Instant) -> usize {
        self.records
            .iter()
            .filter(|&&at| now.saturating_duration_since(at) < self.config.window)
            .count()
    }

    /// Slots that [`admit_at`](Self::admit_at) could grant at `now`
    /// without waiting.
    pub fn available_at(&self, now: Instant) -> usize {
        self.config.capacity - self.in_window_at(now)
    }

    /// How long an admission at `now` would have to wait, or `None` if a
    /// slot is free.
    pub fn retry_after_at(&self, now: Instant) -> Option<Duration> {
        if self.records.len() < self.config.capacity {
            return None;
        }
        self.wait_for_oldest(now)
    }

    fn wait_for_oldest(&self, now: Instant) -> Option<Duration> {
        let oldest = *self.records.front()?;
        let age = now.saturating_duration_since(oldest);
        self.config
            .window
            .checked_sub(age)
            .filter(|wait| !wait.is_zero())
    }
}
