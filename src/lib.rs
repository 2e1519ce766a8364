//! HTTP server hosting request-scoped cancellable tasks.
//!
//! Each registered route's handler runs as an independent request-task owned
//! by the server's task group: cancelled when the client disconnects early,
//! cancelled when the server shuts down, and observed exactly once for its
//! terminal outcome.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod task;

pub use config::schema::ServerConfig;
pub use http::{HttpServer, TaskOutcome};
pub use lifecycle::Shutdown;
pub use routing::{HandlerError, RequestContext, ResponseWriter, RouteRegistry};
pub use task::{CancelToken, SpawnError, TaskGroup};
