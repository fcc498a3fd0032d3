//! Metric instrument registry.
//!
//! # Responsibilities
//! - Declare the service's instruments once, under one measurement namespace
//! - Hand out typed handles by role so call sites cannot misspell a name
//! - Turn every recording into a `MeasurementEvent` for the backend
//!
//! # Instruments
//! - `operation.duration` (histogram, seconds): timed operations
//! - `events.created.count` (counter): business events, by status
//! - `events.value.total` (counter, USD): cumulative business event value
//!
//! # Design Decisions
//! - Recording is best-effort: invalid values and backend faults are logged
//!   and dropped, never returned to the caller
//! - The registry is constructed explicitly and shared via `Arc`; there is no
//!   global instance

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::SystemTime;

use thiserror::Error;

use crate::observability::backend::MetricsBackend;

/// Tag key naming a timed operation.
pub const OPERATION_NAME: &str = "operation.name";
/// Tag key carrying a timed operation's status.
pub const OPERATION_STATUS: &str = "operation.status";
/// Tag key carrying a business event's status.
pub const STATUS: &str = "status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    Counter,
    Histogram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    U64,
    F64,
}

/// An immutable, named measurement channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instrument {
    pub name: &'static str,
    pub unit: &'static str,
    pub description: &'static str,
    pub kind: InstrumentKind,
    pub value_type: ValueType,
}

pub const OPERATION_DURATION: Instrument = Instrument {
    name: "operation.duration",
    unit: "s",
    description: "Duration of timed operations in seconds.",
    kind: InstrumentKind::Histogram,
    value_type: ValueType::F64,
};

pub const EVENTS_CREATED_COUNT: Instrument = Instrument {
    name: "events.created.count",
    unit: "{events}",
    description: "Number of business events, by outcome.",
    kind: InstrumentKind::Counter,
    value_type: ValueType::U64,
};

pub const EVENTS_VALUE_TOTAL: Instrument = Instrument {
    name: "events.value.total",
    unit: "{USD}",
    description: "Cumulative monetary value of business events, by outcome.",
    kind: InstrumentKind::Counter,
    value_type: ValueType::F64,
};

/// Every instrument the registry declares, in declaration order.
pub const INSTRUMENTS: [Instrument; 3] = [OPERATION_DURATION, EVENTS_CREATED_COUNT, EVENTS_VALUE_TOTAL];

/// A single key/value pair attached to a measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: &'static str,
    pub value: Cow<'static, str>,
}

/// Ordered tags for one emission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet(Vec<Tag>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tag, builder style.
    pub fn with(mut self, key: &'static str, value: impl Into<Cow<'static, str>>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: &'static str, value: impl Into<Cow<'static, str>>) {
        self.0.push(Tag { key, value: value.into() });
    }

    /// Value of the first tag with `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|t| t.key == key).map(|t| t.value.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasurementValue {
    U64(u64),
    F64(f64),
}

/// One recording, handed to the backend and not retained by the registry.
#[derive(Debug, Clone)]
pub struct MeasurementEvent<'a> {
    pub namespace: &'a str,
    pub instrument: &'a Instrument,
    pub value: MeasurementValue,
    pub tags: &'a TagSet,
    pub timestamp: SystemTime,
}

/// Errors raised while declaring instruments.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("measurement namespace '{0}' is already registered")]
    DuplicateNamespace(String),

    #[error("measurement namespace must not be empty")]
    EmptyNamespace,

    #[error("instrument '{name}' cannot be declared: {reason}")]
    Unsupported { name: &'static str, reason: String },
}

/// Errors raised while recording a single measurement.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("value {0} is not finite")]
    NonFinite(f64),

    #[error("measurement carries no tags")]
    Untagged,

    #[error("namespace '{0}' was never registered")]
    UnknownNamespace(String),

    #[error("instrument '{0}' was never declared")]
    UnknownInstrument(&'static str),

    #[error("metrics backend unavailable: {0}")]
    Unavailable(String),
}

/// Owns the service's measurement namespace and its instruments.
pub struct InstrumentRegistry {
    namespace: String,
    backend: Arc<dyn MetricsBackend>,
}

impl InstrumentRegistry {
    /// Register `namespace` on `backend` and declare all instruments.
    ///
    /// Fails if the namespace is empty or already registered on the backend.
    pub fn new(namespace: impl Into<String>, backend: Arc<dyn MetricsBackend>) -> Result<Self, RegistryError> {
        let namespace = namespace.into();
        if namespace.trim().is_empty() {
            return Err(RegistryError::EmptyNamespace);
        }

        backend.register(&namespace, &INSTRUMENTS)?;

        tracing::info!(
            namespace = %namespace,
            instruments = INSTRUMENTS.len(),
            "Instrument registry initialized"
        );

        Ok(Self { namespace, backend })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Histogram for generic operation timing, in seconds.
    pub fn operation_duration(&self) -> Histogram<'_> {
        Histogram { registry: self, instrument: &OPERATION_DURATION }
    }

    /// Counter of business events.
    pub fn events_created(&self) -> Counter<'_, u64> {
        Counter { registry: self, instrument: &EVENTS_CREATED_COUNT, _value: PhantomData }
    }

    /// Counter of cumulative business event value.
    pub fn events_value(&self) -> Counter<'_, f64> {
        Counter { registry: self, instrument: &EVENTS_VALUE_TOTAL, _value: PhantomData }
    }

    fn emit(&self, instrument: &'static Instrument, value: MeasurementValue, tags: &TagSet) {
        if let Err(e) = self.try_emit(instrument, value, tags) {
            tracing::warn!(
                namespace = %self.namespace,
                instrument = instrument.name,
                error = %e,
                "Dropped measurement"
            );
        }
    }

    fn try_emit(&self, instrument: &'static Instrument, value: MeasurementValue, tags: &TagSet) -> Result<(), RecordError> {
        if tags.is_empty() {
            return Err(RecordError::Untagged);
        }
        if let MeasurementValue::F64(v) = value {
            if !v.is_finite() {
                return Err(RecordError::NonFinite(v));
            }
        }

        self.backend.emit(&MeasurementEvent {
            namespace: &self.namespace,
            instrument,
            value,
            tags,
            timestamp: SystemTime::now(),
        })
    }
}

impl std::fmt::Debug for InstrumentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentRegistry")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// Monotonic counter handle.
#[derive(Debug, Clone, Copy)]
pub struct Counter<'r, T> {
    registry: &'r InstrumentRegistry,
    instrument: &'static Instrument,
    _value: PhantomData<T>,
}

impl<T> Counter<'_, T> {
    pub fn instrument(&self) -> &'static Instrument {
        self.instrument
    }
}

impl Counter<'_, u64> {
    pub fn add(&self, value: u64, tags: &TagSet) {
        self.registry.emit(self.instrument, MeasurementValue::U64(value), tags);
    }
}

impl Counter<'_, f64> {
    pub fn add(&self, value: f64, tags: &TagSet) {
        self.registry.emit(self.instrument, MeasurementValue::F64(value), tags);
    }
}

/// Histogram handle.
#[derive(Debug, Clone, Copy)]
pub struct Histogram<'r> {
    registry: &'r InstrumentRegistry,
    instrument: &'static Instrument,
}

impl Histogram<'_> {
    pub fn instrument(&self) -> &'static Instrument {
        self.instrument
    }

    pub fn record(&self, value: f64, tags: &TagSet) {
        self.registry.emit(self.instrument, MeasurementValue::F64(value), tags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::backend::MemoryBackend;

    fn registry() -> (InstrumentRegistry, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let registry = InstrumentRegistry::new("test.ecommerce", backend.clone()).unwrap();
        (registry, backend)
    }

    #[test]
    fn test_declares_fixed_instruments() {
        let (registry, backend) = registry();
        assert_eq!(registry.namespace(), "test.ecommerce");

        let declared = backend.instruments("test.ecommerce");
        assert_eq!(declared.len(), 3);

        let duration = registry.operation_duration().instrument();
        assert_eq!(duration.name, "operation.duration");
        assert_eq!(duration.unit, "s");
        assert_eq!(duration.kind, InstrumentKind::Histogram);

        let count = registry.events_created().instrument();
        assert_eq!(count.name, "events.created.count");
        assert_eq!(count.kind, InstrumentKind::Counter);
        assert_eq!(count.value_type, ValueType::U64);

        let value = registry.events_value().instrument();
        assert_eq!(value.name, "events.value.total");
        assert_eq!(value.value_type, ValueType::F64);
    }

    #[test]
    fn test_duplicate_namespace_is_rejected() {
        let backend = Arc::new(MemoryBackend::new());
        let _first = InstrumentRegistry::new("svc.ecommerce", backend.clone()).unwrap();
        let second = InstrumentRegistry::new("svc.ecommerce", backend.clone());
        assert!(matches!(second, Err(RegistryError::DuplicateNamespace(ns)) if ns == "svc.ecommerce"));
    }

    #[test]
    fn test_empty_namespace_is_rejected() {
        let backend = Arc::new(MemoryBackend::new());
        assert!(matches!(
            InstrumentRegistry::new("  ", backend),
            Err(RegistryError::EmptyNamespace)
        ));
    }

    #[test]
    fn test_records_reach_backend() {
        let (registry, backend) = registry();
        let tags = TagSet::new().with(STATUS, "completed");

        registry.events_created().add(1, &tags);
        registry.events_value().add(12.5, &tags);
        registry.operation_duration().record(0.25, &TagSet::new().with(OPERATION_NAME, "op"));

        assert_eq!(backend.counter_u64("events.created.count", &[("status", "completed")]), 1);
        assert_eq!(backend.counter_f64("events.value.total", &[("status", "completed")]), 12.5);
        assert_eq!(backend.histogram("operation.duration", &[("operation.name", "op")]), vec![0.25]);
    }

    #[test]
    fn test_non_finite_values_are_dropped() {
        let (registry, backend) = registry();
        let tags = TagSet::new().with(STATUS, "failed");

        registry.events_value().add(f64::NAN, &tags);
        registry.events_value().add(f64::NEG_INFINITY, &tags);
        registry.operation_duration().record(f64::INFINITY, &tags);

        assert!(backend.measurements().is_empty());
    }

    #[test]
    fn test_untagged_emission_is_dropped() {
        let (registry, backend) = registry();
        registry.events_created().add(1, &TagSet::new());
        assert!(backend.measurements().is_empty());
    }

    #[test]
    fn test_backend_failure_is_swallowed() {
        let (registry, backend) = registry();
        backend.set_available(false);
        registry.events_created().add(1, &TagSet::new().with(STATUS, "completed"));

        backend.set_available(true);
        registry.events_created().add(1, &TagSet::new().with(STATUS, "completed"));
        assert_eq!(backend.counter_u64("events.created.count", &[]), 1);
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let (registry, backend) = registry();
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let tags = TagSet::new().with(STATUS, "completed");
                    for _ in 0..250 {
                        registry.events_created().add(1, &tags);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(backend.counter_u64("events.created.count", &[("status", "completed")]), 2000);
    }

    #[test]
    fn test_tag_set_lookup() {
        let tags = TagSet::new()
            .with(OPERATION_NAME, "order.save")
            .with(OPERATION_STATUS, String::from("succeeded"));
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.get(OPERATION_NAME), Some("order.save"));
        assert_eq!(tags.get(OPERATION_STATUS), Some("succeeded"));
        assert_eq!(tags.get(STATUS), None);
    }
}
