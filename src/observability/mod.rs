//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handlers and repositories produce:
//!     → timing.rs (operation.duration samples)
//!     → events.rs (business event counters)
//!         → instruments.rs (InstrumentRegistry, typed handles)
//!             → backend/ (OpenTelemetry meter or in-memory)
//!
//! The HTTP request pipeline produces:
//!     → logging.rs (structured log events, request span fields)
//!     → metrics.rs (Prometheus request counters and latency)
//!     → tracing.rs (trace ids from inbound W3C headers)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Correlation ID flows through every log line of a request
//! - Recording is best-effort: telemetry faults never fail a request
//! - The registry is injected, never global

pub mod backend;
pub mod events;
pub mod instruments;
pub mod logging;
pub mod metrics;
pub mod outcome;
pub mod timing;
pub mod tracing;

pub use backend::{MemoryBackend, MetricsBackend, OtelBackend};
pub use events::BusinessEventRecorder;
pub use instruments::{InstrumentRegistry, RegistryError, TagSet};
pub use outcome::{FailureKind, Outcome};
pub use timing::TimedOperation;
