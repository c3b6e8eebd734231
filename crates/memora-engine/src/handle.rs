//! A cloneable handle for interrupting a chat session from outside the send loop.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// Cloneable; every clone controls the same session.
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) is_sending: Arc<AtomicBool>,
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            is_sending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Abandon the send in progress. The partial reply stays in the message list.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Whether a send is currently streaming
    pub fn is_sending(&self) -> bool {
        self.is_sending.load(Ordering::Acquire)
    }

    /// Arm a fresh token for the next send
    pub(crate) fn reset(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        token
    }

    pub(crate) fn set_sending(&self, sending: bool) {
        self.is_sending.store(sending, Ordering::Release);
    }
}
