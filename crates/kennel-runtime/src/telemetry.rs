//! OpenTelemetry pipeline initialisation for the edge controller.
//!
//! Call [`init_tracing`] once at process startup, before the Tokio runtime
//! is built, to wire up the `tracing` subscriber with an optional OTLP span
//! exporter.
//!
//! The knobs come from the binary's resolved configuration rather than from
//! ad-hoc environment lookups: the caller passes the log format and the
//! collector endpoint in. Two conventional variables are still honoured:
//! `RUST_LOG` for the log filter (default `"info"`) and
//! `OTEL_EXPORTER_OTLP_ENDPOINT` when the configuration leaves the endpoint
//! unset.
//!
//! # Example
//!
//! ```rust,no_run
//! // Hold the guard for the entire lifetime of the process.
//! let _guard = kennel_runtime::telemetry::init_tracing("kennel-edge", false, None);
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber with an optional OTLP exporter.
///
/// When `otlp_endpoint` is given (or `OTEL_EXPORTER_OTLP_ENDPOINT` is set),
/// an OTLP/HTTP span exporter is configured and all tracing spans are
/// forwarded to the collector; otherwise the function falls back to a plain
/// `tracing-subscriber` console formatter. `json_logs` switches the console
/// formatter to newline-delimited JSON for log aggregators.
///
/// The returned [`TracerProviderGuard`] **must** be held for the lifetime of
/// the process; dropping it flushes all pending span batches.
pub fn init_tracing(
    service_name: &str,
    json_logs: bool,
    otlp_endpoint: Option<&str>,
) -> TracerProviderGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Explicit configuration wins over the conventional collector variable.
    let endpoint = otlp_endpoint
        .map(str::to_owned)
        .or_else(|| std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok());
    let provider = endpoint.and_then(|endpoint| build_provider(service_name, &endpoint));

    if let Some(ref p) = provider {
        let tracer = p.tracer("kennel");
        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        if json_logs {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(otel_layer)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(otel_layer)
                .with(tracing_subscriber::fmt::layer().compact())
                .init();
        }
    } else if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    }

    TracerProviderGuard(provider)
}

// ─────────────────────────────────────────────────────────────────────────────
// RAII guard
// ─────────────────────────────────────────────────────────────────────────────

/// RAII guard that shuts down the OTel [`SdkTracerProvider`] on drop.
///
/// Dropping this guard calls [`SdkTracerProvider::shutdown`], flushing all
/// pending spans before the process exits.  Hold an instance of this type
/// in `main` for the entire program lifetime.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("[kennel] OpenTelemetry provider shutdown error: {e}");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Build an [`SdkTracerProvider`] exporting to `endpoint`.
///
/// Returns `None` if the exporter cannot be initialised (the error is
/// printed to stderr and the caller falls back to plain tracing-subscriber
/// output).
fn build_provider(service_name: &str, endpoint: &str) -> Option<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[kennel] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            // Use the simple (synchronous) exporter so that no Tokio runtime
            // needs to be running at init time.  The kennel binary creates
            // its Tokio runtime only after calling `init_tracing`, making a
            // batch exporter (which internally spawns tasks) unsafe to use
            // here.
            .with_simple_exporter(exporter)
            .build(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
