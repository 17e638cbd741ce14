//! Cooperative cancellation flag shared between a caller and its query.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::RagError;

/// Cloneable flag. Once cancelled, the query stops writing to the caches
/// and the query log.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(RagError::Cancelled)` once the flag is set.
    pub fn check(&self) -> Result<(), RagError> {
        if self.is_cancelled() {
            Err(RagError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(a.check().is_ok());
        b.cancel();
        assert!(a.is_cancelled());
        assert!(matches!(a.check(), Err(RagError::Cancelled)));
    }
}
