//! Cancellation tokens for request-tasks.

use std::sync::Arc;
use tokio::sync::watch;

/// Cancellation signal shared between a request-task and its observers.
///
/// The token is a level signal, not an edge: once cancelled it stays
/// cancelled, and repeated [`cancel`](CancelToken::cancel) calls are no-ops.
/// Cancellation carries no originating identity; a disconnect listener and a
/// shutdown path look the same to the task.
///
/// Tokens handed out by [`TaskGroup`](crate::task::TaskGroup) are linked to
/// the group's closing signal, so a task observes cancellation when either
/// its own token fires or the whole group shuts down.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
    parent: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// Create a standalone token.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
            parent: None,
        }
    }

    /// Create a token that is also cancelled when `parent` becomes true.
    pub(crate) fn with_parent(parent: watch::Receiver<bool>) -> Self {
        let mut token = Self::new();
        token.parent = Some(parent);
        token
    }

    /// Request cancellation. Idempotent: calling this on an already-cancelled
    /// token, or on a token whose task has already completed, does nothing.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.parent.as_ref().is_some_and(|p| *p.borrow())
    }

    /// Resolve once cancellation has been requested.
    ///
    /// Resolves immediately if the token is already cancelled.
    pub async fn cancelled(&self) {
        let mut own = self.rx.clone();
        match &self.parent {
            None => {
                let _ = own.wait_for(|cancelled| *cancelled).await;
            }
            Some(parent) => {
                let mut parent = parent.clone();
                tokio::select! {
                    _ = own.wait_for(|cancelled| *cancelled) => {}
                    _ = parent.wait_for(|closing| *closing) => {}
                }
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let token = CancelToken::new();
        let observer = token.clone();
        let waiter = tokio::spawn(async move { observer.cancelled().await });
        token.cancel();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        token.cancelled().await;
    }

    #[tokio::test]
    async fn parent_signal_cancels_child() {
        let (tx, rx) = watch::channel(false);
        let token = CancelToken::with_parent(rx);
        assert!(!token.is_cancelled());

        tx.send_replace(true);
        assert!(token.is_cancelled());
        token.cancelled().await;
    }
}
