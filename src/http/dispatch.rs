//! Per-request dispatch.
//!
//! # Responsibilities
//! - Spawn each matched request's handler as a request-task in the server's
//!   task group
//! - Attach a tracing span identifying method and path
//! - Observe the task's terminal outcome; log non-cancellation failures with
//!   request context
//! - Cancel the task when the client connection is destroyed before a
//!   response exists
//! - Answer 500 for tasks that finish without writing, 503 when the group is
//!   closing
//!
//! # Design Decisions
//! - Outcome observation happens inside the spawned task, so it runs even
//!   when the connection is gone
//! - Cancellation and normal completion may race; the token is idempotent, so
//!   the loser of the race is a no-op
//! - Failures are logged once and never rethrown: the response stream may be
//!   partially written and the host server has no recovery action left

use std::sync::Arc;

use axum::extract::Request;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::sync::oneshot;
use tracing::Instrument;
use uuid::Uuid;

use crate::observability::metrics;
use crate::routing::handler::{
    HandlerError, RequestContext, ResponseWriter, RouteHandler, WriteError,
};
use crate::routing::registry::Route;
use crate::task::{CancelToken, SpawnError, TaskGroup};

/// Terminal outcome of a request-task. Each task reaches exactly one.
#[derive(Debug)]
pub enum TaskOutcome {
    /// The handler finished without error.
    Completed,
    /// The handler finished with a typed failure.
    Failed(HandlerError),
    /// The task was cancelled, by client disconnect or server shutdown.
    Cancelled,
}

/// Handle one matched request.
///
/// This is the callback installed into the dispatch table for every
/// registered route; from the server's perspective it is an ordinary
/// handler.
pub(crate) async fn dispatch(
    tasks: Arc<TaskGroup>,
    route: Arc<Route>,
    request: Request,
) -> Response {
    let method = route.method().clone();
    let path = route.path().to_string();

    let (parts, body) = request.into_parts();
    let headers = parts.headers.clone();
    let ctx = RequestContext::new(method.clone(), path.clone(), parts.uri, parts.headers, body);

    let (reply_tx, reply_rx) = oneshot::channel();
    let writer = ResponseWriter::new(reply_tx);

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "route",
        method = %method,
        path = %path,
        request_id = %request_id,
    );

    let handler = Arc::clone(&route.handler);
    let task_method = method.clone();
    let task_path = path.clone();
    let spawned = tasks.spawn(move |token| {
        run_request_task(handler, ctx, writer, token, task_method, task_path, headers)
            .instrument(span)
    });

    let handle = match spawned {
        Ok(handle) => handle,
        Err(SpawnError::Closing) => {
            return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
        }
    };

    metrics::record_dispatched(method.as_str(), &path);

    // The server drops this future when the client connection is destroyed;
    // the guard turns that drop into a cancellation request. Disarmed once a
    // reply exists, so late disconnects cancel nothing.
    let guard = DisconnectGuard::arm(handle.cancel_token());
    let reply = reply_rx.await;
    guard.disarm();

    match reply {
        Ok(response) => response,
        Err(_) if handle.cancel_token().is_cancelled() => {
            (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response()
        }
        Err(_) => {
            tracing::debug!(
                method = %method,
                path = %path,
                "handler completed without writing a response"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "handler produced no response",
            )
                .into_response()
        }
    }
}

/// The body of one request-task: race the handler against cancellation, then
/// observe the outcome.
async fn run_request_task(
    handler: Arc<dyn RouteHandler>,
    ctx: RequestContext,
    writer: ResponseWriter,
    token: CancelToken,
    method: Method,
    path: String,
    headers: HeaderMap,
) -> TaskOutcome {
    let outcome = tokio::select! {
        // Cancellation wins when both branches are ready.
        biased;
        _ = token.cancelled() => TaskOutcome::Cancelled,
        result = handler.call(ctx, writer) => match result {
            Ok(()) => TaskOutcome::Completed,
            Err(error) => TaskOutcome::Failed(error),
        },
    };

    // A write that failed because the peer vanished while cancellation was in
    // flight is a disconnect, not a handler failure.
    let outcome = match outcome {
        TaskOutcome::Failed(HandlerError::Write(WriteError::ConnectionClosed))
            if token.is_cancelled() =>
        {
            TaskOutcome::Cancelled
        }
        outcome => outcome,
    };

    observe_outcome(&outcome, &method, &path, &headers);
    outcome
}

/// Record one terminal outcome. Warning logs carry the request context;
/// cancellation is expected termination and is never logged as an error.
fn observe_outcome(outcome: &TaskOutcome, method: &Method, path: &str, headers: &HeaderMap) {
    match outcome {
        TaskOutcome::Completed => {
            metrics::record_outcome("completed", method.as_str(), path);
        }
        TaskOutcome::Failed(error) => {
            metrics::record_outcome("failed", method.as_str(), path);
            tracing::warn!(
                method = %method,
                path = %path,
                headers = ?headers,
                error = %error,
                "unhandled error in route handler"
            );
        }
        TaskOutcome::Cancelled => {
            metrics::record_outcome("cancelled", method.as_str(), path);
            tracing::debug!(method = %method, path = %path, "request-task cancelled");
        }
    }
}

/// Cancels the request-task if dropped while still armed.
struct DisconnectGuard {
    token: Option<CancelToken>,
}

impl DisconnectGuard {
    fn arm(token: CancelToken) -> Self {
        Self { token: Some(token) }
    }

    fn disarm(mut self) {
        self.token = None;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            tracing::debug!("connection closed before response; cancelling request-task");
            token.cancel();
        }
    }
}
