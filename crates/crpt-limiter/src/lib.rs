//! Sliding-window admission control.
//!
//! Enforces "at most N operations per rolling window D" in front of a
//! rate-limited service. Callers that would exceed the limit are suspended
//! until the oldest admission ages out of the window.
//!
//! Two front ends share the same [`History`] bookkeeping:
//!
//! - [`RateLimiter`] for tokio tasks, cancellable with any future.
//! - [`BlockingRateLimiter`] for OS threads, cancellable with a
//!   [`CancelToken`].
//!
//! ```no_run
//! # async fn run() -> crpt_limiter::Result<()> {
//! use std::time::Duration;
//! use crpt_limiter::RateLimiter;
//!
//! let limiter = RateLimiter::new(5, Duration::from_secs(60))?;
//! limiter.acquire().await?;
//! // ... perform one call against the protected service ...
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod blocking;
pub mod clock;
pub mod error;
pub mod history;
pub mod limiter;

pub use blocking::{BlockingRateLimiter, CancelToken};
pub use clock::{Clock, ManualClock, MonotonicClock, TokioClock};
pub use error::{LimitError, Result};
pub use history::{Admission, History, WindowConfig};
pub use limiter::RateLimiter;
