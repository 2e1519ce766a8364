//! Integration tests for server shutdown: the task group drains, outstanding
//! request-tasks are cancelled, and nothing new is admitted.

mod common;

use std::time::Duration;

use axum::http::Method;

use task_host::routing::handler::{HandlerError, RequestContext, ResponseWriter};
use task_host::{RouteRegistry, SpawnError};

use common::{start_server, url, wait_until, LogCapture};

async fn hang(_ctx: RequestContext, _writer: ResponseWriter) -> Result<(), HandlerError> {
    std::future::pending::<()>().await;
    Ok(())
}

#[tokio::test]
async fn shutdown_cancels_all_outstanding_tasks() {
    let capture = LogCapture::default();
    let _guard = capture.install();

    let mut registry = RouteRegistry::new();
    registry.register([Method::GET], "/hang", hang).unwrap();
    let server = start_server(registry).await;

    let client = reqwest::Client::new();
    let mut pending = Vec::new();
    for _ in 0..3 {
        let request = client.get(url(server.addr, "/hang"));
        pending.push(tokio::spawn(async move { request.send().await }));
    }

    assert!(wait_until(|| server.tasks.active_count() == 3, Duration::from_secs(2)).await);

    server.shutdown.trigger();

    assert!(wait_until(|| server.tasks.active_count() == 0, Duration::from_secs(2)).await);

    // Cancelled tasks never wrote; their dispatches answer 503 while the
    // connection is still open.
    for task in pending {
        if let Ok(response) = task.await.unwrap() {
            assert_eq!(response.status(), 503);
        }
    }

    // Cancellation is expected termination, not an error.
    assert!(capture.warnings().is_empty(), "{:?}", capture.warnings());
}

#[tokio::test]
async fn closed_group_rejects_new_tasks() {
    let server = start_server(RouteRegistry::new()).await;

    server.shutdown.trigger();
    assert!(wait_until(|| server.tasks.is_closing(), Duration::from_secs(2)).await);

    let result = server.tasks.spawn(|_token| async {});
    assert!(matches!(result, Err(SpawnError::Closing)));
}

#[tokio::test]
async fn requests_after_close_are_rejected() {
    let mut registry = RouteRegistry::new();
    registry.register([Method::GET], "/hang", hang).unwrap();
    let server = start_server(registry).await;

    // Reach the serve loop once so the listener is known to be live.
    let response = reqwest::get(url(server.addr, "/health")).await.unwrap();
    assert_eq!(response.status(), 200);

    server.tasks.close();

    let response = reqwest::get(url(server.addr, "/hang")).await.unwrap();
    assert_eq!(response.status(), 503);

    server.shutdown.trigger();
}
