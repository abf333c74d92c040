//! Caller-side cancellation
//!
//! A host hands every call a `CancellationToken`. Cancelling it wakes any
//! thread blocked in a `select!` on `signal()`, so a caller waiting for the
//! owning thread can abandon the wait promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::Interrupted;

struct Inner {
    cancelled: AtomicBool,
    /// Dropped on cancel; disconnection wakes every receiver
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

/// Shared, clonable cancellation flag with a wake-up channel.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(tx)),
                signal: rx,
            }),
        }
    }

    /// Cancel; idempotent
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.trigger.lock().take();
    }

    /// Check whether `cancel` has been called
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Receiver that becomes ready (disconnected) once the token is cancelled.
    ///
    /// Never yields a message; only use it inside `select!`.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }

    /// `Err(Interrupted)` if cancelled
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::{select, TryRecvError};

    #[test]
    fn test_token_starts_live() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
        assert_eq!(token.signal().try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_cancel_wakes_signal() {
        let token = CancellationToken::new();
        let clone = token.clone();
        let handle = std::thread::spawn(move || {
            select! {
                recv(clone.signal()) -> _ => true,
            }
        });
        token.cancel();
        assert!(handle.join().unwrap());
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(Interrupted));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancel();
        assert_eq!(token.signal().try_recv(), Err(TryRecvError::Disconnected));
    }
}
