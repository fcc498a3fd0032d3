//! In-memory metrics backend.
//!
//! Keeps every measurement it receives so tests can assert on exact tag sets
//! and values. Not meant for long-running processes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

use crate::observability::backend::MetricsBackend;
use crate::observability::instruments::{
    Instrument, MeasurementEvent, MeasurementValue, RecordError, RegistryError,
};

/// An owned copy of one `MeasurementEvent`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMeasurement {
    pub namespace: String,
    pub instrument: &'static str,
    pub value: MeasurementValue,
    pub tags: Vec<(String, String)>,
    pub timestamp: SystemTime,
}

impl RecordedMeasurement {
    /// True if every `(key, value)` in `expected` is present in the tags.
    pub fn has_tags(&self, expected: &[(&str, &str)]) -> bool {
        expected
            .iter()
            .all(|(k, v)| self.tags.iter().any(|(tk, tv)| tk == k && tv == v))
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn as_f64(&self) -> f64 {
        match self.value {
            MeasurementValue::U64(v) => v as f64,
            MeasurementValue::F64(v) => v,
        }
    }
}

/// Backend that stores measurements in process memory.
#[derive(Debug)]
pub struct MemoryBackend {
    namespaces: Mutex<HashMap<String, Vec<Instrument>>>,
    measurements: Mutex<Vec<RecordedMeasurement>>,
    available: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            namespaces: Mutex::new(HashMap::new()),
            measurements: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the reporting mechanism going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Instruments declared under `namespace`.
    pub fn instruments(&self, namespace: &str) -> Vec<Instrument> {
        self.namespaces
            .lock()
            .expect("memory backend mutex poisoned")
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of every measurement received so far.
    pub fn measurements(&self) -> Vec<RecordedMeasurement> {
        self.measurements.lock().expect("memory backend mutex poisoned").clone()
    }

    /// Measurements for `instrument` whose tags include `tags`.
    pub fn matching(&self, instrument: &str, tags: &[(&str, &str)]) -> Vec<RecordedMeasurement> {
        self.measurements
            .lock()
            .expect("memory backend mutex poisoned")
            .iter()
            .filter(|m| m.instrument == instrument && m.has_tags(tags))
            .cloned()
            .collect()
    }

    /// Sum of an integer counter across matching measurements.
    pub fn counter_u64(&self, instrument: &str, tags: &[(&str, &str)]) -> u64 {
        self.matching(instrument, tags)
            .iter()
            .map(|m| match m.value {
                MeasurementValue::U64(v) => v,
                MeasurementValue::F64(v) => v as u64,
            })
            .sum()
    }

    /// Sum of a floating-point counter across matching measurements.
    pub fn counter_f64(&self, instrument: &str, tags: &[(&str, &str)]) -> f64 {
        self.matching(instrument, tags).iter().map(RecordedMeasurement::as_f64).sum()
    }

    /// Recorded histogram values, in arrival order.
    pub fn histogram(&self, instrument: &str, tags: &[(&str, &str)]) -> Vec<f64> {
        self.matching(instrument, tags).iter().map(RecordedMeasurement::as_f64).collect()
    }

    pub fn clear(&self) {
        self.measurements.lock().expect("memory backend mutex poisoned").clear();
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsBackend for MemoryBackend {
    fn register(&self, namespace: &str, instruments: &[Instrument]) -> Result<(), RegistryError> {
        let mut namespaces = self.namespaces.lock().expect("memory backend mutex poisoned");
        if namespaces.contains_key(namespace) {
            return Err(RegistryError::DuplicateNamespace(namespace.to_string()));
        }
        namespaces.insert(namespace.to_string(), instruments.to_vec());
        Ok(())
    }

    fn emit(&self, event: &MeasurementEvent<'_>) -> Result<(), RecordError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(RecordError::Unavailable("memory backend disabled".to_string()));
        }

        {
            let namespaces = self.namespaces.lock().expect("memory backend mutex poisoned");
            let declared = namespaces
                .get(event.namespace)
                .ok_or_else(|| RecordError::UnknownNamespace(event.namespace.to_string()))?;
            if !declared.iter().any(|i| i.name == event.instrument.name) {
                return Err(RecordError::UnknownInstrument(event.instrument.name));
            }
        }

        let recorded = RecordedMeasurement {
            namespace: event.namespace.to_string(),
            instrument: event.instrument.name,
            value: event.value,
            tags: event
                .tags
                .iter()
                .map(|t| (t.key.to_string(), t.value.to_string()))
                .collect(),
            timestamp: event.timestamp,
        };
        self.measurements.lock().expect("memory backend mutex poisoned").push(recorded);
        Ok(())
    }
}
