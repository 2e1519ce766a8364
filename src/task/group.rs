//! The server lifetime scope for request-tasks.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

use crate::task::cancel::CancelToken;

/// How long to wait for aborted tasks to unwind after the drain deadline.
const ABORT_GRACE: Duration = Duration::from_secs(5);

/// Error returned when a task cannot be spawned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpawnError {
    /// The group has begun shutting down; no new tasks are accepted.
    #[error("task group is shutting down")]
    Closing,
}

/// Owns every outstanding request-task for one server instance.
///
/// Tasks spawned into the group run independently of the spawner's stack but
/// never outlive the group: [`close`](TaskGroup::close) signals cancellation
/// to all of them, and [`shutdown`](TaskGroup::shutdown) additionally awaits
/// the drain. Spawning into a closing group fails fast rather than leaking a
/// task into teardown.
pub struct TaskGroup {
    /// Closing flag; doubles as the group-wide cancellation signal.
    closing: watch::Sender<bool>,
    /// In-flight task count, observed for draining.
    active: Arc<watch::Sender<u64>>,
    /// Abort handles for tasks that outlive the drain deadline.
    aborts: Mutex<Vec<AbortHandle>>,
}

impl TaskGroup {
    /// Create an empty, open group.
    pub fn new() -> Self {
        let (closing, _) = watch::channel(false);
        let (active, _) = watch::channel(0);
        Self {
            closing,
            active: Arc::new(active),
            aborts: Mutex::new(Vec::new()),
        }
    }

    /// Spawn a request-task into the group.
    ///
    /// The closure receives the task's [`CancelToken`]; the future it builds
    /// is expected to observe the token at its suspension points. The token
    /// is linked to the group, so group shutdown cancels the task too.
    ///
    /// A task that slips past the closing check while [`close`](Self::close)
    /// runs concurrently is still counted and still observes the closing
    /// signal through its token, so it cannot escape the drain.
    pub fn spawn<F, Fut, T>(&self, f: F) -> Result<TaskHandle<T>, SpawnError>
    where
        F: FnOnce(CancelToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if *self.closing.borrow() {
            return Err(SpawnError::Closing);
        }

        let token = CancelToken::with_parent(self.closing.subscribe());
        self.active.send_modify(|n| *n += 1);
        let guard = ActiveGuard {
            active: Arc::clone(&self.active),
        };

        let future = f(token.clone());
        let join = tokio::spawn(async move {
            let _guard = guard;
            future.await
        });

        let mut aborts = self.aborts.lock().expect("abort handle lock poisoned");
        aborts.retain(|handle| !handle.is_finished());
        aborts.push(join.abort_handle());

        Ok(TaskHandle { cancel: token, join })
    }

    /// Signal shutdown without waiting.
    ///
    /// Every outstanding task observes cancellation through its token, and
    /// subsequent [`spawn`](Self::spawn) calls fail with
    /// [`SpawnError::Closing`]. Idempotent.
    pub fn close(&self) {
        self.closing.send_replace(true);
    }

    /// Whether the group has begun shutting down.
    pub fn is_closing(&self) -> bool {
        *self.closing.borrow()
    }

    /// Number of tasks currently running.
    pub fn active_count(&self) -> u64 {
        *self.active.borrow()
    }

    /// Close the group and wait for all tasks to finish.
    ///
    /// Tasks still running `drain_timeout` after the closing signal are
    /// aborted; cooperative cancellation should make that path rare.
    pub async fn shutdown(&self, drain_timeout: Duration) {
        self.close();

        let mut active = self.active.subscribe();
        if tokio::time::timeout(drain_timeout, wait_for_zero(&mut active))
            .await
            .is_ok()
        {
            tracing::debug!("all request-tasks drained");
            return;
        }

        tracing::warn!(
            remaining = self.active_count(),
            "drain deadline reached; aborting remaining request-tasks"
        );
        let handles: Vec<AbortHandle> = {
            let mut aborts = self.aborts.lock().expect("abort handle lock poisoned");
            aborts.drain(..).collect()
        };
        for handle in handles {
            handle.abort();
        }

        if tokio::time::timeout(ABORT_GRACE, wait_for_zero(&mut active))
            .await
            .is_err()
        {
            tracing::error!(
                remaining = self.active_count(),
                "request-tasks still running after abort"
            );
        }
    }
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_zero(active: &mut watch::Receiver<u64>) {
    let _ = active.wait_for(|count| *count == 0).await;
}

/// Decrements the active count when the task finishes, however it finishes.
struct ActiveGuard {
    active: Arc<watch::Sender<u64>>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Handle to one spawned request-task.
pub struct TaskHandle<T> {
    cancel: CancelToken,
    join: JoinHandle<T>,
}

impl<T> TaskHandle<T> {
    /// The task's cancellation token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Request cancellation of this task.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the task has reached a terminal outcome.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task and return its output, or `None` if it was aborted
    /// or panicked.
    pub async fn join(self) -> Option<T> {
        self.join.await.ok()
    }
}
