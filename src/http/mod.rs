//! HTTP hosting subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → server.rs (Axum dispatch table, middleware)
//!     → dispatch.rs (spawn request-task into the server's task group)
//!     → handler writes response through the writer
//!     → dispatch.rs reconciles outcome with the connection state
//! ```

pub mod dispatch;
pub mod server;

pub use dispatch::TaskOutcome;
pub use server::HttpServer;
