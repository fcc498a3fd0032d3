//! OpenTelemetry metrics backend.
//!
//! Each registered namespace becomes one OpenTelemetry `Meter`; each declared
//! instrument becomes a typed OpenTelemetry counter or histogram. Export is
//! left to the meter provider's readers (OTLP when configured).

use std::collections::HashMap;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use opentelemetry::metrics::{Counter, Histogram, MeterProvider as _, MetricsError};
use opentelemetry::{KeyValue, Value};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::{runtime, Resource};

use crate::config::ObservabilityConfig;
use crate::observability::backend::MetricsBackend;
use crate::observability::instruments::{
    Instrument, InstrumentKind, MeasurementEvent, MeasurementValue, RecordError, RegistryError, TagSet,
    ValueType,
};

/// Build the process meter provider.
///
/// With an OTLP endpoint configured, measurements are pushed periodically over
/// gRPC. Without one, instruments still aggregate but nothing is exported.
pub fn build_meter_provider(config: &ObservabilityConfig) -> Result<SdkMeterProvider, MetricsError> {
    let resource = Resource::new(vec![KeyValue::new("service.name", config.service_name.clone())]);

    match &config.otlp_endpoint {
        Some(endpoint) => {
            tracing::info!(endpoint = %endpoint, "Exporting metrics over OTLP");
            opentelemetry_otlp::new_pipeline()
                .metrics(runtime::Tokio)
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint.clone()),
                )
                .with_period(Duration::from_secs(config.export_interval_secs))
                .with_resource(resource)
                .build()
        }
        None => {
            tracing::info!("No OTLP endpoint configured, business metrics are not exported");
            Ok(SdkMeterProvider::builder().with_resource(resource).build())
        }
    }
}

enum OtelInstrument {
    U64Counter(Counter<u64>),
    F64Counter(Counter<f64>),
    U64Histogram(Histogram<u64>),
    F64Histogram(Histogram<f64>),
}

/// Backend writing into OpenTelemetry instruments.
pub struct OtelBackend {
    provider: SdkMeterProvider,
    namespaces: DashMap<String, HashMap<&'static str, OtelInstrument>>,
}

impl OtelBackend {
    pub fn new(provider: SdkMeterProvider) -> Self {
        Self {
            provider,
            namespaces: DashMap::new(),
        }
    }

    /// Flush pending measurements and stop the provider's readers.
    pub fn shutdown(&self) {
        if let Err(e) = self.provider.shutdown() {
            tracing::warn!(error = %e, "Meter provider shutdown failed");
        }
    }
}

impl MetricsBackend for OtelBackend {
    fn register(&self, namespace: &str, instruments: &[Instrument]) -> Result<(), RegistryError> {
        match self.namespaces.entry(namespace.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateNamespace(namespace.to_string())),
            Entry::Vacant(slot) => {
                let meter = self.provider.versioned_meter(
                    // opentelemetry 0.26 requires a 'static name; each namespace is registered once.
                    Box::leak(namespace.to_string().into_boxed_str()),
                    Some(env!("CARGO_PKG_VERSION")),
                    None::<&'static str>,
                    None,
                );
                let mut declared = HashMap::with_capacity(instruments.len());

                for instrument in instruments {
                    let built = match (instrument.kind, instrument.value_type) {
                        (InstrumentKind::Counter, ValueType::U64) => OtelInstrument::U64Counter(
                            meter
                                .u64_counter(instrument.name)
                                .with_unit(instrument.unit)
                                .with_description(instrument.description)
                                .init(),
                        ),
                        (InstrumentKind::Counter, ValueType::F64) => OtelInstrument::F64Counter(
                            meter
                                .f64_counter(instrument.name)
                                .with_unit(instrument.unit)
                                .with_description(instrument.description)
                                .init(),
                        ),
                        (InstrumentKind::Histogram, ValueType::U64) => OtelInstrument::U64Histogram(
                            meter
                                .u64_histogram(instrument.name)
                                .with_unit(instrument.unit)
                                .with_description(instrument.description)
                                .init(),
                        ),
                        (InstrumentKind::Histogram, ValueType::F64) => OtelInstrument::F64Histogram(
                            meter
                                .f64_histogram(instrument.name)
                                .with_unit(instrument.unit)
                                .with_description(instrument.description)
                                .init(),
                        ),
                    };
                    declared.insert(instrument.name, built);
                }

                slot.insert(declared);
                Ok(())
            }
        }
    }

    fn emit(&self, event: &MeasurementEvent<'_>) -> Result<(), RecordError> {
        let namespace = self
            .namespaces
            .get(event.namespace)
            .ok_or_else(|| RecordError::UnknownNamespace(event.namespace.to_string()))?;
        let instrument = namespace
            .get(event.instrument.name)
            .ok_or(RecordError::UnknownInstrument(event.instrument.name))?;

        let attributes = key_values(event.tags);
        match (instrument, event.value) {
            (OtelInstrument::U64Counter(c), MeasurementValue::U64(v)) => c.add(v, &attributes),
            (OtelInstrument::U64Counter(c), MeasurementValue::F64(v)) => c.add(v as u64, &attributes),
            (OtelInstrument::F64Counter(c), value) => c.add(as_f64(value), &attributes),
            (OtelInstrument::U64Histogram(h), MeasurementValue::U64(v)) => h.record(v, &attributes),
            (OtelInstrument::U64Histogram(h), MeasurementValue::F64(v)) => h.record(v as u64, &attributes),
            (OtelInstrument::F64Histogram(h), value) => h.record(as_f64(value), &attributes),
        }
        Ok(())
    }
}

fn as_f64(value: MeasurementValue) -> f64 {
    match value {
        MeasurementValue::U64(v) => v as f64,
        MeasurementValue::F64(v) => v,
    }
}

fn key_values(tags: &TagSet) -> Vec<KeyValue> {
    tags.iter()
        .map(|tag| KeyValue::new(tag.key, Value::from(tag.value.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::instruments::{InstrumentRegistry, STATUS};
    use std::sync::Arc;

    #[test]
    fn test_register_and_record_without_exporter() {
        let backend = Arc::new(OtelBackend::new(SdkMeterProvider::builder().build()));
        let registry = InstrumentRegistry::new("otel.ecommerce", backend.clone()).unwrap();

        let tags = TagSet::new().with(STATUS, "completed");
        registry.events_created().add(1, &tags);
        registry.events_value().add(19.99, &tags);
        registry.operation_duration().record(0.002, &tags);

        assert!(matches!(
            InstrumentRegistry::new("otel.ecommerce", backend.clone()),
            Err(RegistryError::DuplicateNamespace(_))
        ));
        backend.shutdown();
    }

    #[test]
    fn test_unknown_namespace() {
        let backend = OtelBackend::new(SdkMeterProvider::builder().build());
        let tags = TagSet::new().with(STATUS, "failed");
        let result = backend.emit(&MeasurementEvent {
            namespace: "nope",
            instrument: &crate::observability::instruments::EVENTS_CREATED_COUNT,
            value: MeasurementValue::U64(1),
            tags: &tags,
            timestamp: std::time::SystemTime::now(),
        });
        assert!(matches!(result, Err(RecordError::UnknownNamespace(ns)) if ns == "nope"));
    }
}
