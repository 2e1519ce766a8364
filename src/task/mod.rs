//! Request-task lifetime subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch path:
//!     TaskGroup::spawn(|token| future)
//!     → task runs on the runtime, counted as active
//!     → terminal outcome observed exactly once
//!     → guard drops, active count decrements
//!
//! Cancellation:
//!     CancelToken::cancel() (client disconnect)     ┐
//!     TaskGroup::close()    (server shutdown)       ┴→ token observed by task
//! ```
//!
//! # Design Decisions
//! - Cancellation is cooperative: the task observes its token at suspension
//!   points; nothing is torn down mid-poll
//! - Cancelling an already-terminal task is a no-op, never an error
//! - A closing group rejects new spawns instead of leaking tasks into teardown
//! - Shutdown waits for the drain; tasks that outlive the deadline are aborted

pub mod cancel;
pub mod group;

pub use cancel::CancelToken;
pub use group::{SpawnError, TaskGroup, TaskHandle};
