//! Order entity and its business rules.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::observability::outcome::FailureKind;
use crate::orders::repository::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("total_amount must be a positive number, got {0}")]
    InvalidAmount(f64),

    #[error("order {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl OrderError {
    /// How the failure is classified in business event tags and logs.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            OrderError::InvalidAmount(_) => FailureKind::Validation,
            OrderError::InvalidTransition { .. } => {
                FailureKind::Error("InvalidTransition".to_string())
            }
            OrderError::Repository(_) => FailureKind::Downstream,
        }
    }
}

/// A customer order. Only constructed through [`Order::create`], so every
/// instance has a positive amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: f64,
    pub status: OrderStatus,
    /// Unix seconds.
    pub created_at: u64,
}

impl Order {
    pub fn create(user_id: Uuid, total_amount: f64) -> Result<Self, OrderError> {
        if !total_amount.is_finite() || total_amount <= 0.0 {
            return Err(OrderError::InvalidAmount(total_amount));
        }

        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            total_amount,
            status: OrderStatus::Pending,
            created_at,
        })
    }

    /// Only pending orders can complete.
    pub fn mark_completed(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Pending {
            return Err(OrderError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: OrderStatus::Completed,
            });
        }
        self.status = OrderStatus::Completed;
        Ok(())
    }

    pub fn mark_failed(&mut self) {
        self.status = OrderStatus::Failed;
    }
}
