//! OpenTelemetry tracing and metrics bootstrap, behind the `telemetry` feature.
//!
//! Export goes to an OTLP collector when `OTEL_EXPORTER_OTLP_*` environment
//! variables are set; otherwise this falls back to local `tracing_subscriber`
//! logging. A facilitator binary registers this once at startup:
//!
//! ```ignore
//! let telemetry = Telemetry::new()
//!     .with_name(env!("CARGO_PKG_NAME"))
//!     .with_version(env!("CARGO_PKG_VERSION"))
//!     .register();
//! let app = Router::new().layer(telemetry.http_tracing());
//! ```

use std::env;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{KeyValue, global};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider};
use opentelemetry_semantic_conventions::SCHEMA_URL;
use opentelemetry_semantic_conventions::attribute::{DEPLOYMENT_ENVIRONMENT_NAME, SERVICE_VERSION};
use serde::{Deserialize, Serialize};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// OTLP transport protocol, detected from `OTEL_EXPORTER_OTLP_PROTOCOL`.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum TelemetryProtocol {
    #[serde(rename = "http/protobuf")]
    HTTP,
    #[serde(rename = "grpc")]
    GRPC,
}

impl TelemetryProtocol {
    /// Determines the OTLP protocol from the environment, if tracing export
    /// is configured at all.
    fn from_env() -> Option<Self> {
        let is_enabled = env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok()
            || env::var("OTEL_EXPORTER_OTLP_HEADERS").is_ok()
            || env::var("OTEL_EXPORTER_OTLP_PROTOCOL").is_ok();
        if !is_enabled {
            return None;
        }
        Some(match env::var("OTEL_EXPORTER_OTLP_PROTOCOL") {
            Ok(value) if value == "grpc" => TelemetryProtocol::GRPC,
            _ => TelemetryProtocol::HTTP,
        })
    }
}

fn resource(name: &str, version: &str) -> Resource {
    let deployment_env = env::var("DEPLOYMENT_ENV").unwrap_or_else(|_| "develop".to_string());
    Resource::builder()
        .with_service_name(name.to_string())
        .with_schema_url(
            [
                KeyValue::new(SERVICE_VERSION, version.to_string()),
                KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, deployment_env),
            ],
            SCHEMA_URL,
        )
        .build()
}

fn init_meter_provider(protocol: TelemetryProtocol, resource: Resource) -> SdkMeterProvider {
    let exporter = opentelemetry_otlp::MetricExporter::builder();
    let exporter = match protocol {
        TelemetryProtocol::HTTP => exporter
            .with_http()
            .with_temporality(opentelemetry_sdk::metrics::Temporality::default())
            .build(),
        TelemetryProtocol::GRPC => exporter
            .with_tonic()
            .with_temporality(opentelemetry_sdk::metrics::Temporality::default())
            .build(),
    }
    .expect("failed to build OTLP metric exporter");

    let reader = PeriodicReader::builder(exporter)
        .with_interval(std::time::Duration::from_secs(30))
        .build();
    let stdout_reader =
        PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default()).build();

    let meter_provider = MeterProviderBuilder::default()
        .with_resource(resource)
        .with_reader(reader)
        .with_reader(stdout_reader)
        .build();
    global::set_meter_provider(meter_provider.clone());
    meter_provider
}

fn init_tracer_provider(protocol: TelemetryProtocol, resource: Resource) -> SdkTracerProvider {
    let exporter = opentelemetry_otlp::SpanExporter::builder();
    let exporter = match protocol {
        TelemetryProtocol::HTTP => exporter.with_http().build(),
        TelemetryProtocol::GRPC => exporter.with_tonic().build(),
    }
    .expect("failed to build OTLP span exporter");

    SdkTracerProvider::builder()
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
            1.0,
        ))))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build()
}

/// Builder for process-wide OpenTelemetry tracing/metrics, registered once at
/// facilitator startup.
pub struct TelemetryBuilder {
    name: String,
    version: String,
}

impl TelemetryBuilder {
    /// Service name reported on the OpenTelemetry resource, e.g. the
    /// facilitator binary's crate name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Service version reported on the OpenTelemetry resource.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Initializes the global `tracing_subscriber` registry: OTLP export to
    /// the collector named by `OTEL_EXPORTER_OTLP_*` when configured, local
    /// `fmt` logging otherwise.
    pub fn register(self) -> Telemetry {
        match TelemetryProtocol::from_env() {
            Some(protocol) => {
                let resource = resource(&self.name, &self.version);
                let tracer_provider = init_tracer_provider(protocol, resource.clone());
                let meter_provider = init_meter_provider(protocol, resource);
                let tracer = tracer_provider.tracer("tracing-otel-subscriber");

                tracing_subscriber::registry()
                    // Prevents the exporter's own network stack from
                    // reentering the OpenTelemetryLayer with its own spans.
                    .with(tracing_subscriber::filter::LevelFilter::INFO)
                    .with(tracing_subscriber::fmt::layer())
                    .with(MetricsLayer::new(meter_provider.clone()))
                    .with(OpenTelemetryLayer::new(tracer))
                    .init();

                tracing::info!(
                    ?protocol,
                    "OpenTelemetry tracing and metrics exporter is enabled"
                );
                Telemetry {
                    tracer_provider: Some(tracer_provider),
                    meter_provider: Some(meter_provider),
                }
            }
            None => {
                tracing_subscriber::registry()
                    .with(tracing_subscriber::fmt::layer())
                    .init();
                tracing::info!("OpenTelemetry is not enabled");
                Telemetry {
                    tracer_provider: None,
                    meter_provider: None,
                }
            }
        }
    }
}

/// Process-wide OpenTelemetry state. Shuts down exporters on drop, so the
/// facilitator binary should keep this alive for the lifetime of the server.
pub struct Telemetry {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl Telemetry {
    /// Starts a [`TelemetryBuilder`]; call `.with_name()`/`.with_version()`
    /// then `.register()` to actually install the subscriber.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> TelemetryBuilder {
        TelemetryBuilder {
            name: "x402-facilitator".to_string(),
            version: "0.0.0".to_string(),
        }
    }

    /// A `tower_http` trace layer for the facilitator's Axum router, so HTTP
    /// request spans are correlated with whatever tracer [`Self::new`]
    /// registered.
    pub fn http_tracing(&self) -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
        TraceLayer::new_for_http()
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Some(tracer_provider) = self.tracer_provider.as_ref()
            && let Err(err) = tracer_provider.shutdown()
        {
            eprintln!("{err:?}");
        }
        if let Some(meter_provider) = self.meter_provider.as_ref()
            && let Err(err) = meter_provider.shutdown()
        {
            eprintln!("{err:?}");
        }
    }
}
