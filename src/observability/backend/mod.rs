//! Reporting backends for the instrument registry.
//!
//! # Data Flow
//! ```text
//! InstrumentRegistry handle (add / record)
//!     → MeasurementEvent
//!     → MetricsBackend::emit
//!         → otel.rs   (OpenTelemetry meter, exported over OTLP)
//!         → memory.rs (in-process aggregation, used by tests)
//! ```
//!
//! # Design Decisions
//! - Backends are `Send + Sync` and aggregate concurrent writes internally
//! - Namespaces are registered once per backend; a second registration of
//!   the same name is a startup error

pub mod memory;
pub mod otel;

pub use memory::{MemoryBackend, RecordedMeasurement};
pub use otel::{build_meter_provider, OtelBackend};

use crate::observability::instruments::{Instrument, MeasurementEvent, RecordError, RegistryError};

/// Destination for instrument declarations and measurements.
pub trait MetricsBackend: Send + Sync + 'static {
    /// Declare `instruments` under `namespace`.
    fn register(&self, namespace: &str, instruments: &[Instrument]) -> Result<(), RegistryError>;

    /// Record one measurement against a previously declared instrument.
    fn emit(&self, event: &MeasurementEvent<'_>) -> Result<(), RecordError>;
}
