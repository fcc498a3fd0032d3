//! Timed operations.
//!
//! Wraps any fallible async action, measures its wall-clock duration and
//! records exactly one `operation.duration` sample tagged with the operation
//! name and its status. The action's result is returned untouched.

use std::borrow::Cow;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::observability::instruments::{InstrumentRegistry, TagSet, OPERATION_NAME, OPERATION_STATUS};

/// `operation.status` value for an action that returned `Ok`.
pub const SUCCEEDED: &str = "succeeded";
/// `operation.status` value for an action that returned `Err` or was dropped.
pub const FAILED: &str = "failed";

/// A named operation whose duration is recorded into the registry.
#[derive(Debug)]
pub struct TimedOperation<'r> {
    registry: &'r InstrumentRegistry,
    name: Cow<'static, str>,
}

impl<'r> TimedOperation<'r> {
    pub fn new(registry: &'r InstrumentRegistry, name: impl Into<Cow<'static, str>>) -> Self {
        Self { registry, name: name.into() }
    }

    /// Run `action`, timing it regardless of outcome.
    ///
    /// If the returned future is dropped before `action` resolves, the sample
    /// is still recorded with a failed status.
    pub async fn run<T, E, F, Fut>(self, action: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut pending = PendingSample {
            operation: &self,
            started: Instant::now(),
            armed: true,
        };

        let result = action().await;
        let elapsed = pending.started.elapsed();
        pending.armed = false;

        let status = if result.is_ok() { SUCCEEDED } else { FAILED };
        self.record(elapsed, status);
        result
    }

    fn record(&self, elapsed: Duration, status: &'static str) {
        let tags = TagSet::new()
            .with(OPERATION_NAME, self.name.clone())
            .with(OPERATION_STATUS, status);
        self.registry.operation_duration().record(elapsed.as_secs_f64(), &tags);
    }
}

impl InstrumentRegistry {
    /// Shorthand for [`TimedOperation::new`].
    pub fn timed(&self, name: impl Into<Cow<'static, str>>) -> TimedOperation<'_> {
        TimedOperation::new(self, name)
    }
}

/// Records the sample if the timed future is dropped mid-flight.
struct PendingSample<'a, 'r> {
    operation: &'a TimedOperation<'r>,
    started: Instant,
    armed: bool,
}

impl Drop for PendingSample<'_, '_> {
    fn drop(&mut self) {
        if self.armed {
            let elapsed = self.started.elapsed();
            tracing::debug!(
                operation = %self.operation.name,
                elapsed_ms = elapsed.as_millis() as u64,
                "Timed operation cancelled"
            );
            self.operation.record(elapsed, FAILED);
        }
    }
}
