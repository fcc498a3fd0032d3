//! Order use cases.
//!
//! Every create attempt is timed as `order.create` and counted as a business
//! event, whether it succeeds or not.

use std::sync::Arc;

use uuid::Uuid;

use crate::observability::{BusinessEventRecorder, FailureKind, InstrumentRegistry, Outcome};
use crate::orders::order::{Order, OrderError};
use crate::orders::repository::OrderRepository;

pub const OP_CREATE: &str = "order.create";

pub struct OrderService {
    repository: Arc<dyn OrderRepository>,
    registry: Arc<InstrumentRegistry>,
    events: BusinessEventRecorder,
}

impl OrderService {
    pub fn new(repository: Arc<dyn OrderRepository>, registry: Arc<InstrumentRegistry>) -> Self {
        let events = BusinessEventRecorder::new(registry.clone());
        Self {
            repository,
            registry,
            events,
        }
    }

    /// Validate, complete and persist a new order.
    ///
    /// Validation runs before persistence, so a rejected amount never
    /// reaches the repository. The stored order already carries its final
    /// status. If the returned future is dropped mid-flight the attempt is
    /// still counted as a cancelled failure.
    pub async fn create(&self, user_id: Uuid, total_amount: f64) -> Result<Order, OrderError> {
        let mut pending = PendingEvent {
            events: &self.events,
            total_amount,
            armed: true,
        };

        let result = self
            .registry
            .timed(OP_CREATE)
            .run(|| async {
                let mut order = Order::create(user_id, total_amount)?;
                order.mark_completed()?;
                self.repository.save(&order).await?;
                Ok::<_, OrderError>(order)
            })
            .await;
        pending.armed = false;

        match &result {
            Ok(order) => {
                tracing::info!(
                    order_id = %order.id,
                    user_id = %user_id,
                    total_amount,
                    "Order created"
                );
                self.events.record(&Outcome::Completed, total_amount);
            }
            Err(err) => {
                let kind = err.failure_kind();
                if kind == FailureKind::Validation {
                    tracing::warn!(user_id = %user_id, total_amount, error = %err, "Order rejected");
                } else {
                    tracing::error!(
                        user_id = %user_id,
                        total_amount,
                        failure = %kind,
                        error = %err,
                        "Failed to create order"
                    );
                }
                self.events.record(&Outcome::Failed(kind), total_amount);
            }
        }

        result
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        Ok(self.repository.get_by_id(id).await?)
    }
}

/// Counts the create attempt as cancelled if its future is dropped.
struct PendingEvent<'a> {
    events: &'a BusinessEventRecorder,
    total_amount: f64,
    armed: bool,
}

impl Drop for PendingEvent<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(total_amount = self.total_amount, "Order creation cancelled");
            self.events
                .record(&Outcome::Failed(FailureKind::Cancelled), self.total_amount);
        }
    }
}
