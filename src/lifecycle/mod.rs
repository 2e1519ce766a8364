//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Register routes → Bind listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Cancel request-tasks → Drain → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then routes, listener last
//! - Ordered shutdown: stop accept, cancel, drain, close
//! - Draining has a deadline: stragglers are aborted, not waited on forever

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
