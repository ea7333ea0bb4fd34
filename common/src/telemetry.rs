// Telemetry module for structured logging, metrics, and tracing

use crate::errors::TransportError;
use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const SERVICE_NAME: &str = "device-bridge";

/// Initialize structured JSON logging
///
/// The filter comes from `RUST_LOG` when set, otherwise from `log_level`.
/// When `tracing_endpoint` is given, spans are also exported over OTLP.
#[tracing::instrument(skip_all)]
pub fn init_logging(log_level: &str, tracing_endpoint: Option<&str>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_target(true)
        .with_thread_ids(true)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(json_layer);

    if let Some(endpoint) = tracing_endpoint {
        let tracer = init_tracer(endpoint)?;
        registry
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        registry
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::info!(
        log_level = log_level,
        tracing_endpoint = tracing_endpoint,
        "Structured logging initialized"
    );

    Ok(())
}

#[tracing::instrument(skip_all)]
fn init_tracer(endpoint: &str) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_sdk::runtime::Tokio;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| anyhow::anyhow!("Failed to build span exporter: {}", e))?;

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![
                    KeyValue::new("service.name", SERVICE_NAME),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])),
        )
        .build();

    global::set_tracer_provider(tracer_provider.clone());
    let tracer = tracer_provider.tracer(SERVICE_NAME);

    tracing::info!(endpoint = endpoint, "OTLP span exporter initialized");
    Ok(tracer)
}

/// Flush remaining spans on shutdown
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// Install the Prometheus exporter and describe the poll metrics
#[tracing::instrument(skip_all)]
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!("poll_ticks_total", "Shared timer ticks executed");
    describe_counter!("poll_batches_sent_total", "Batches acknowledged by the transport");
    describe_counter!(
        "poll_delivery_failures_total",
        "Batches the transport failed to deliver"
    );
    describe_counter!("poll_payloads_total", "Payloads produced by poll generators");
    describe_counter!(
        "poll_payloads_sent_total",
        "Payloads inside acknowledged batches"
    );
    describe_counter!(
        "poll_generator_panics_total",
        "Poll generator invocations that panicked"
    );
    describe_gauge!("poll_tick_interval_ms", "Current shared tick interval, 0 when idle");
    describe_gauge!("poll_enabled_pollers", "Number of enabled pollers");

    tracing::info!(metrics_port = metrics_port, "Prometheus metrics exporter initialized");
    Ok(())
}

#[inline]
pub fn record_tick() {
    counter!("poll_ticks_total").increment(1);
}

#[inline]
pub fn record_batch_sent(payloads: usize) {
    counter!("poll_batches_sent_total").increment(1);
    counter!("poll_payloads_sent_total").increment(payloads as u64);
}

#[inline]
pub fn record_delivery_failure(error: &TransportError) {
    counter!("poll_delivery_failures_total", "reason" => failure_reason(error)).increment(1);
}

/// Label value for the `reason` dimension of delivery failures
fn failure_reason(error: &TransportError) -> &'static str {
    match error {
        TransportError::NotAcknowledged(_) => "not_acknowledged",
        TransportError::ChannelClosed => "channel_closed",
        TransportError::Timeout(_) => "timeout",
        TransportError::Serialization(_) => "serialization",
    }
}

#[inline]
pub fn record_payloads(namespace: &str, count: usize) {
    counter!("poll_payloads_total", "namespace" => namespace.to_string()).increment(count as u64);
}

#[inline]
pub fn record_generator_panic(namespace: &str) {
    counter!("poll_generator_panics_total", "namespace" => namespace.to_string()).increment(1);
}

#[inline]
pub fn record_tick_interval(tick_interval_ms: Option<u64>) {
    gauge!("poll_tick_interval_ms").set(tick_interval_ms.unwrap_or(0) as f64);
}

#[inline]
pub fn record_enabled_pollers(count: usize) {
    gauge!("poll_enabled_pollers").set(count as f64);
}
