//! Process-wide execution state and the per-command session guard.
//!
//! The driver is the sole actor for the user's browser, so exactly one
//! command may execute at a time. Claiming the session arms a fresh
//! cancellation token; `stop()` cancels whatever command holds it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Shared driver state. One per embedding.
#[derive(Debug, Default)]
pub struct DriverState {
    executing: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
}

impl DriverState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    /// Claim the session for one command. Returns `None` when a command is
    /// already executing; callers surface that as a busy rejection, never a
    /// queue. The previous stop flag is cleared by installing a fresh token.
    pub fn try_begin(self: &Arc<Self>) -> Option<CommandSession> {
        if self
            .executing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        let token = CancellationToken::new();
        *self.cancel.lock() = Some(token.clone());
        Some(CommandSession {
            state: Arc::clone(self),
            token,
        })
    }

    /// Request cooperative cancellation of the running command, if any.
    pub fn stop(&self) {
        if let Some(token) = self.cancel.lock().as_ref() {
            token.cancel();
        }
    }
}

/// Guard owning one command's execution slot. Dropping it releases the
/// slot and disarms the stop flag.
#[derive(Debug)]
pub struct CommandSession {
    state: Arc<DriverState>,
    token: CancellationToken,
}

impl CommandSession {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for CommandSession {
    fn drop(&mut self) {
        *self.state.cancel.lock() = None;
        self.state.executing.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_rejected_until_release() {
        let state = DriverState::new();
        let session = state.try_begin().expect("first claim");
        assert!(state.try_begin().is_none());
        drop(session);
        assert!(state.try_begin().is_some());
    }

    #[test]
    fn stop_cancels_only_the_armed_token() {
        let state = DriverState::new();
        // No session: stop is a no-op.
        state.stop();

        let session = state.try_begin().unwrap();
        assert!(!session.is_cancelled());
        state.stop();
        assert!(session.is_cancelled());
        drop(session);

        // A fresh session starts with a cleared flag.
        let session = state.try_begin().unwrap();
        assert!(!session.is_cancelled());
    }

    #[test]
    fn drop_releases_the_execution_flag() {
        let state = DriverState::new();
        {
            let _session = state.try_begin().unwrap();
            assert!(state.is_executing());
        }
        assert!(!state.is_executing());
    }
}
