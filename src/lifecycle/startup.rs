//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the meter provider and the instrument registry
//! - Assemble the application state (store, instrumentation, service)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::sync::Arc;

use opentelemetry::metrics::MetricsError;
use thiserror::Error;

use crate::config::ServiceConfig;
use crate::http::AppState;
use crate::observability::backend::build_meter_provider;
use crate::observability::{InstrumentRegistry, OtelBackend, RegistryError};
use crate::orders::{InMemoryOrderRepository, InstrumentedOrderRepository, OrderService};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build meter provider: {0}")]
    MeterProvider(#[from] MetricsError),

    #[error("failed to create instrument registry: {0}")]
    Registry(#[from] RegistryError),
}

/// Process-wide business telemetry.
pub struct Telemetry {
    pub registry: Arc<InstrumentRegistry>,
    backend: Arc<OtelBackend>,
}

impl Telemetry {
    pub fn init(config: &ServiceConfig) -> Result<Self, StartupError> {
        let provider = build_meter_provider(&config.observability)?;
        let backend = Arc::new(OtelBackend::new(provider));
        let registry = InstrumentRegistry::new(config.metric_namespace(), backend.clone())?;

        tracing::info!(namespace = %registry.namespace(), "Instrument registry ready");
        Ok(Self {
            registry: Arc::new(registry),
            backend,
        })
    }

    /// Flush and stop metric export.
    pub fn shutdown(&self) {
        self.backend.shutdown();
    }
}

/// Wire the order service over an instrumented in-memory store.
pub fn build_state(registry: Arc<InstrumentRegistry>) -> AppState {
    let store = InMemoryOrderRepository::new();
    let repository = InstrumentedOrderRepository::new(store, registry.clone());
    AppState {
        orders: Arc::new(OrderService::new(Arc::new(repository), registry)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_telemetry_without_exporter() {
        let telemetry = Telemetry::init(&ServiceConfig::default()).unwrap();
        assert_eq!(telemetry.registry.namespace(), "order-api.ecommerce");

        let state = build_state(telemetry.registry.clone());
        let order = state.orders.create(uuid::Uuid::new_v4(), 5.0).await.unwrap();
        assert_eq!(order.total_amount, 5.0);

        telemetry.shutdown();
    }

    #[tokio::test]
    async fn test_telemetry_with_runtime_service_name() {
        let mut config = ServiceConfig::default();
        config.observability.service_name = format!("checkout-{}", std::process::id());

        let telemetry = Telemetry::init(&config).unwrap();
        assert_eq!(telemetry.registry.namespace(), config.metric_namespace());

        let state = build_state(telemetry.registry.clone());
        let err = state.orders.create(uuid::Uuid::new_v4(), -1.0).await.unwrap_err();
        assert!(matches!(err, crate::orders::OrderError::InvalidAmount(_)));

        telemetry.shutdown();
    }
}
