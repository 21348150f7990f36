use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    /// Capacity or window was zero when the limiter was built.
    #[error("invalid limiter configuration: capacity {capacity} per {window:?}")]
    InvalidConfiguration { capacity: usize, window: Duration },

    /// The caller gave up (cancellation signal, deadline or shutdown)
    /// before a slot was granted. No admission was recorded.
    #[error("acquire cancelled before a slot was granted")]
    Cancelled,
}

impl LimitError {
    /// Returns `true` when the acquire was abandoned and may be retried.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, LimitError>;
