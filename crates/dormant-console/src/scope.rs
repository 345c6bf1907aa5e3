//! Cancellation scopes tied to a view's lifetime.
//!
//! A view creates a [`ViewScope`] when it mounts and runs every suspend point
//! through [`ViewScope::run`]. Cancelling the scope (or dropping the view that
//! owns it) resolves pending calls to `None` so their results are never
//! applied to state that no longer exists.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// Cancellation handle shared by a view and its in-flight calls.
#[derive(Debug, Clone)]
pub struct ViewScope {
    cancelled: Arc<watch::Sender<bool>>,
}

impl ViewScope {
    /// Fresh, active scope.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            cancelled: Arc::new(sender),
        }
    }

    /// Cancel every call running through this scope.
    pub fn cancel(&self) {
        self.cancelled.send_replace(true);
    }

    /// Whether the scope has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Drive `future` unless the scope is cancelled first.
    ///
    /// Cancellation observed between polls wins. A future whose final poll
    /// cancels the scope itself (a `401` forcing the login route) still
    /// yields its output so the caller sees why the view went away.
    pub async fn run<F>(&self, future: F) -> Option<F::Output>
    where
        F: Future,
    {
        let mut receiver = self.cancelled.subscribe();
        if *receiver.borrow_and_update() {
            return None;
        }
        tokio::select! {
            biased;
            _ = receiver.wait_for(|cancelled| *cancelled) => None,
            output = future => Some(output),
        }
    }
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn active_scope_returns_output() {
        let scope = ViewScope::new();
        assert_eq!(scope.run(async { 7 }).await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_pending_call() {
        let scope = ViewScope::new();
        let worker = scope.clone();
        let pending = tokio::spawn(async move {
            worker
                .run(async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    "late"
                })
                .await
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        scope.cancel();
        assert_eq!(pending.await.ok().flatten(), None);
    }

    #[tokio::test]
    async fn call_that_cancels_its_own_scope_keeps_output() {
        let scope = ViewScope::new();
        let inner = scope.clone();
        let output = scope
            .run(async move {
                inner.cancel();
                "rejected"
            })
            .await;
        assert_eq!(output, Some("rejected"));
        assert!(scope.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_scope_skips_new_calls() {
        let scope = ViewScope::new();
        scope.cancel();
        assert!(scope.is_cancelled());
        assert_eq!(scope.run(async { 1 }).await, None);
    }
}
