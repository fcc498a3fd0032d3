//! Business event counters.

use std::sync::Arc;

use crate::observability::instruments::{InstrumentRegistry, TagSet, STATUS};
use crate::observability::outcome::Outcome;

/// Records business events into the registry's event counters.
///
/// Both counters move together on every call, successful or not: a failed
/// attempt is counted and its value accumulated under `status=failed`.
#[derive(Debug, Clone)]
pub struct BusinessEventRecorder {
    registry: Arc<InstrumentRegistry>,
}

impl BusinessEventRecorder {
    pub fn new(registry: Arc<InstrumentRegistry>) -> Self {
        Self { registry }
    }

    /// Count one event and add `magnitude` to the value total.
    ///
    /// `magnitude` is recorded as given, zero included. Non-finite values are
    /// dropped by the registry with a warning; the event is still counted.
    pub fn record(&self, outcome: &Outcome, magnitude: f64) {
        let tags = TagSet::new().with(STATUS, outcome.status());

        self.registry.events_created().add(1, &tags);
        self.registry.events_value().add(magnitude, &tags);

        if let Outcome::Failed(kind) = outcome {
            tracing::debug!(failure = %kind, magnitude, "Recorded failed business event");
        }
    }
}
