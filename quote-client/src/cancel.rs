use std::fmt;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Флаг отмены, который можно передать в другой поток.
///
/// Клоны разделяют один флаг: `cancel()` на любом из них видят все.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Почему вызов был прерван
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// истёк request timeout
    Timeout,
    /// сработал [`CancelToken`]
    Signal,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Timeout => f.write_str("request timed out"),
            CancelReason::Signal => f.write_str("cancelled by caller"),
        }
    }
}
