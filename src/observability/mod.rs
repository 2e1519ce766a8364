//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch and task group produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (request-task counters, in-flight gauge)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - One warning per failed request-task, carrying method, path, headers
//! - Cancellation is never logged above debug level
//! - Metrics are cheap (atomic increments behind the metrics facade)

pub mod logging;
pub mod metrics;
