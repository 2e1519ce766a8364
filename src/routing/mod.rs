//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     RouteRegistry::register(methods, path, handler)
//!     → duplicate / unsupported-method checks (fail fast)
//!     → registry consumed by the HTTP server
//!     → compiled into the dispatch table, immutable from then on
//!
//! Per request:
//!     matched route → handler produces the request's unit of work
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime (no locking)
//! - Duplicate (method, path) registration is a startup error, never a
//!   request-time surprise
//! - Handlers write their own response through the writer; the dispatch
//!   layer only observes the outcome

pub mod handler;
pub mod registry;

pub use handler::{HandlerError, RequestContext, ResponseWriter, RouteHandler, WriteError};
pub use registry::{RegistryError, Route, RouteRegistry};
