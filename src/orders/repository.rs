//! Order persistence.
//!
//! # Responsibilities
//! - Define the storage contract the order service depends on
//! - Provide an in-memory store
//! - Time every storage call as an operation
//!
//! # Design Decisions
//! - Instrumentation is a decorator, so stores stay unaware of metrics
//! - The in-memory store can be switched off to exercise downstream faults

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::observability::InstrumentRegistry;
use crate::orders::order::Order;

pub const OP_SAVE: &str = "order.save";
pub const OP_FETCH: &str = "order.fetch";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("order store unavailable: {0}")]
    Unavailable(String),

    #[error("order {0} already exists")]
    Conflict(Uuid),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn save(&self, order: &Order) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Order>, RepositoryError>;
}

/// Process-local order store.
#[derive(Debug)]
pub struct InMemoryOrderRepository {
    orders: DashMap<Uuid, Order>,
    available: AtomicBool,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// While unavailable every call fails with [`RepositoryError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepositoryError::Unavailable("in-memory store disabled".to_string()))
        }
    }
}

impl Default for InMemoryOrderRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        self.check_available()?;
        match self.orders.entry(order.id) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(order.id)),
            Entry::Vacant(slot) => {
                slot.insert(order.clone());
                Ok(())
            }
        }
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        self.check_available()?;
        Ok(self.orders.get(&id).map(|o| o.value().clone()))
    }
}

#[async_trait]
impl<R: OrderRepository + ?Sized> OrderRepository for Arc<R> {
    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        (**self).save(order).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        (**self).get_by_id(id).await
    }
}

/// Times every call of the wrapped store.
pub struct InstrumentedOrderRepository<R> {
    inner: R,
    registry: Arc<InstrumentRegistry>,
}

impl<R: OrderRepository> InstrumentedOrderRepository<R> {
    pub fn new(inner: R, registry: Arc<InstrumentRegistry>) -> Self {
        Self { inner, registry }
    }
}

#[async_trait]
impl<R: OrderRepository> OrderRepository for InstrumentedOrderRepository<R> {
    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        self.registry
            .timed(OP_SAVE)
            .run(|| self.inner.save(order))
            .await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        self.registry
            .timed(OP_FETCH)
            .run(|| self.inner.get_by_id(id))
            .await
    }
}
