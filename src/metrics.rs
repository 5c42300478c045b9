//! OpenTelemetry instruments for plan compilation and statement execution.
//!
//! With the `metrics` feature, all instruments live on the global meter `partquery`.
//! Install an exporter with `install_prometheus_exporter` before the first query runs;
//! instruments created earlier report to whatever provider was global at that point.
//! With the `tracing` feature, `tracing_helpers` builds the span wrapped around each
//! statement.

#[cfg(feature = "metrics")]
use once_cell::sync::Lazy;
#[cfg(feature = "metrics")]
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
    KeyValue,
};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics::SdkMeterProvider;
#[cfg(feature = "metrics")]
use std::time::Duration;

#[cfg(feature = "metrics")]
pub static METRICS: Lazy<PartQueryMetrics> = Lazy::new(PartQueryMetrics::init);

#[cfg(feature = "metrics")]
pub struct PartQueryMetrics {
    pub plans_compiled: Counter<u64>,
    pub plan_cache_hits: Counter<u64>,
    pub queries_total: Counter<u64>,
    pub query_errors: Counter<u64>,
    pub query_duration: Histogram<f64>,
}

#[cfg(feature = "metrics")]
impl PartQueryMetrics {
    pub fn init() -> Self {
        let meter = global::meter("partquery");

        let plans_compiled = meter
            .u64_counter("partquery_plans_compiled_total")
            .with_description("Query plans compiled from method names")
            .build();

        let plan_cache_hits = meter
            .u64_counter("partquery_plan_cache_hits_total")
            .with_description("Calls served by an already compiled plan")
            .build();

        let queries_total = meter
            .u64_counter("partquery_queries_total")
            .with_description("Statements handed to the executor")
            .build();

        let query_errors = meter
            .u64_counter("partquery_query_errors_total")
            .with_description("Statements the executor failed to run")
            .build();

        let query_duration = meter
            .f64_histogram("partquery_query_duration_seconds")
            .with_description("Duration of statement execution")
            .with_unit("s")
            .build();

        Self {
            plans_compiled,
            plan_cache_hits,
            queries_total,
            query_errors,
            query_duration,
        }
    }

    pub fn record_plan_compiled(&self) {
        self.plans_compiled.add(1, &[]);
    }

    pub fn record_plan_cache_hit(&self) {
        self.plan_cache_hits.add(1, &[]);
    }

    pub fn record_query(&self, operation: &'static str, elapsed: Duration) {
        let attrs = [KeyValue::new("operation", operation)];
        self.queries_total.add(1, &attrs);
        self.query_duration.record(elapsed.as_secs_f64(), &attrs);
    }

    pub fn record_query_error(&self, operation: &'static str) {
        self.query_errors
            .add(1, &[KeyValue::new("operation", operation)]);
    }
}

/// Export the `partquery` instruments through `registry` and make the exporting
/// provider the global one.
///
/// # Errors
///
/// Returns a description of the failure if the exporter cannot be built.
#[cfg(feature = "metrics")]
pub fn install_prometheus_exporter(registry: prometheus::Registry) -> Result<SdkMeterProvider, String> {
    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry)
        .build()
        .map_err(|e| format!("failed to build prometheus exporter: {e}"))?;
    let provider = SdkMeterProvider::builder().with_reader(exporter).build();
    global::set_meter_provider(provider.clone());
    Ok(provider)
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    //! Spans around statement execution.

    use tracing::Span;

    /// Span for one statement handed to the executor.
    pub fn execute_query_span(sql: &str, operation: &'static str) -> Span {
        tracing::info_span!("partquery.execute", db.statement = sql, db.operation = operation)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::sync::{Arc, Mutex};
        use tracing::span::{Attributes, Id};
        use tracing::Subscriber;
        use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
        use tracing_subscriber::registry::Registry;

        #[derive(Clone, Default)]
        struct SpanNames(Arc<Mutex<Vec<String>>>);

        impl<S: Subscriber> Layer<S> for SpanNames {
            fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
                self.0.lock().unwrap().push(attrs.metadata().name().to_string());
            }
        }

        #[test]
        fn test_execute_query_span_is_recorded() {
            let names = SpanNames::default();
            let subscriber = Registry::default().with(names.clone());
            tracing::subscriber::with_default(subscriber, || {
                let _guard = execute_query_span("SELECT 1", "find").entered();
            });
            assert_eq!(names.0.lock().unwrap().as_slice(), ["partquery.execute"]);
        }
    }
}
