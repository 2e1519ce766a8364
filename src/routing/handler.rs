//! The contract between registered routes and the dispatch layer.

use std::future::Future;
use std::pin::Pin;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio::sync::oneshot;

/// Error returned when a response cannot be written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WriteError {
    /// A response was already written for this request.
    #[error("response already sent")]
    AlreadySent,
    /// The client connection went away before the response could be sent.
    #[error("connection closed before response was sent")]
    ConnectionClosed,
}

/// Failure a route handler may complete with.
///
/// Handler failures are contained per-request: the dispatch layer logs them
/// with request context and moves on. Nothing a handler returns can affect
/// other requests or the server's accept loop.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Free-form failure raised by route logic.
    #[error("{0}")]
    Message(String),

    /// The response writer could not deliver the response.
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Failure propagated from an underlying operation.
    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Build a [`HandlerError::Message`].
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wrap an underlying error.
    pub fn other(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(error))
    }
}

/// Snapshot of one inbound request, owned by its request-task.
pub struct RequestContext {
    method: Method,
    route_path: String,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
}

impl RequestContext {
    pub(crate) fn new(
        method: Method,
        route_path: String,
        uri: Uri,
        headers: HeaderMap,
        body: Body,
    ) -> Self {
        Self {
            method,
            route_path,
            uri,
            headers,
            body,
        }
    }

    /// The request's HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path the route was registered under.
    pub fn route_path(&self) -> &str {
        &self.route_path
    }

    /// The full request URI.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Take the request body, leaving an empty body behind.
    pub fn take_body(&mut self) -> Body {
        std::mem::replace(&mut self.body, Body::empty())
    }
}

/// Single-shot response channel handed to a route handler.
///
/// The handler is responsible for writing the response before it completes;
/// the dispatch layer answers 500 for tasks that never do.
pub struct ResponseWriter {
    reply: Option<oneshot::Sender<Response>>,
}

impl ResponseWriter {
    pub(crate) fn new(reply: oneshot::Sender<Response>) -> Self {
        Self { reply: Some(reply) }
    }

    /// Send the response to the client. Fails if a response was already sent
    /// or the client connection is gone.
    pub fn send(&mut self, response: impl IntoResponse) -> Result<(), WriteError> {
        match self.reply.take() {
            None => Err(WriteError::AlreadySent),
            Some(tx) => tx
                .send(response.into_response())
                .map_err(|_| WriteError::ConnectionClosed),
        }
    }

    /// Whether a response has been written.
    pub fn is_sent(&self) -> bool {
        self.reply.is_none()
    }
}

/// Boxed future returned by route handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

/// A registered route's handler: given the request and a response writer,
/// produce the request's unit of work.
///
/// Implemented for any `Fn(RequestContext, ResponseWriter) -> impl Future`,
/// so plain async closures register directly.
pub trait RouteHandler: Send + Sync + 'static {
    fn call(&self, ctx: RequestContext, writer: ResponseWriter) -> HandlerFuture;
}

impl<F, Fut> RouteHandler for F
where
    F: Fn(RequestContext, ResponseWriter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn call(&self, ctx: RequestContext, writer: ResponseWriter) -> HandlerFuture {
        Box::pin(self(ctx, writer))
    }
}
