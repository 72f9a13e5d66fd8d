//! Cooperative cancellation shared between a request and its worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{CompressionError, Result};

/// Cloneable flag checked by codecs between blocks, channels and solver sweeps.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(CompressionError::Cancelled);
        }
        Ok(())
    }

    /// Guard that cancels this token when dropped, unless disarmed first.
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            token: Some(self.clone()),
        }
    }
}

/// Trips its token on drop. Held by whoever owns the request, so abandoning
/// the request stops the worker.
#[derive(Debug)]
pub struct CancelOnDrop {
    token: Option<CancellationToken>,
}

impl CancelOnDrop {
    /// Lets the work finish undisturbed and hands the token back.
    pub fn disarm(mut self) -> CancellationToken {
        self.token.take().unwrap_or_default()
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let worker = token.clone();
        assert!(worker.check().is_ok());
        token.cancel();
        assert_eq!(worker.check(), Err(CompressionError::Cancelled));
    }

    #[test]
    fn test_drop_guard_cancels() {
        let token = CancellationToken::new();
        let guard = token.drop_guard();
        assert!(!token.is_cancelled());
        drop(guard);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_disarmed_guard_leaves_token() {
        let token = CancellationToken::new();
        let returned = token.drop_guard().disarm();
        assert!(!token.is_cancelled());
        returned.cancel();
        assert!(token.is_cancelled());
    }
}
