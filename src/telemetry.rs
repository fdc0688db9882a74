use std::time::Instant;

use anyhow::Context;
use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::{Protocol, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{SERVICE_NAME, SERVICE_VERSION},
    resource::DEPLOYMENT_ENVIRONMENT_NAME,
};
use rocket::{
    Data, Request, Response,
    fairing::{Fairing, Info, Kind},
};
use tonic::metadata::{Ascii, MetadataMap, MetadataValue};
use tracing::{Span, field::Empty, info_span};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::TELEMETRY_GUARD;

const DEFAULT_OTLP_ENDPOINT: &str = "https://api.honeycomb.io:443";

pub struct TelemetryFairing;

#[rocket::async_trait]
impl Fairing for TelemetryFairing {
    fn info(&self) -> Info {
        Info {
            name: "OpenTelemetry",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        let method = request.method().to_string();
        let uri = request.uri().path().to_string();

        let span = info_span!(
            "http_request",
            otel.name = format!("{} {}", method, uri),
            http.method = %method,
            http.uri = %uri,
            http.route = Empty,
            http.status_code = Empty,
            http.duration_ms = Empty,
        );

        request.local_cache(|| (span, Instant::now()));
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let (span, start_time): &(Span, Instant) =
            request.local_cache(|| (info_span!("http_request"), Instant::now()));

        let duration = start_time.elapsed();
        let status = response.status().code;

        // Routing happens after on_request, so the matched route is only known here.
        if let Some(route) = request.route() {
            span.record("http.route", tracing::field::display(&route.uri));
        }
        span.record("http.status_code", status);
        span.record("http.duration_ms", duration.as_millis() as i64);

        let _entered = span.enter();
        tracing::info!(
            "Completed request in {}ms with status {}",
            duration.as_millis(),
            status
        );
    }
}

fn resource() -> Resource {
    let environment = dotenvy::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

    Resource::builder()
        .with_schema_url(
            [
                KeyValue::new(SERVICE_NAME, env!("CARGO_PKG_NAME")),
                KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
                KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, environment),
            ],
            SCHEMA_URL,
        )
        .build()
}

fn init_tracer_provider(api_key: &str) -> anyhow::Result<SdkTracerProvider> {
    let endpoint = dotenvy::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| DEFAULT_OTLP_ENDPOINT.to_string());

    let mut metadata = MetadataMap::new();
    metadata.insert(
        "x-honeycomb-team",
        api_key
            .parse::<MetadataValue<Ascii>>()
            .context("HONEYCOMB_API_KEY is not a valid header value")?,
    );

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_tls_config(tonic::transport::ClientTlsConfig::new().with_native_roots())
        .with_protocol(Protocol::Grpc)
        .with_metadata(metadata)
        .build()
        .context("Failed to build OTLP span exporter")?;

    Ok(SdkTracerProvider::builder()
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build())
}

pub struct OtelGuard {
    tracer_provider: SdkTracerProvider,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Err(err) = self.tracer_provider.shutdown() {
            eprintln!("Failed to shut down tracer provider: {:?}", err);
        }
    }
}

/// Installs the global subscriber. Spans are exported over OTLP only when
/// `HONEYCOMB_API_KEY` is set; the returned guard flushes them on drop.
pub fn init_tracing() -> anyhow::Result<Option<OtelGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let api_key = dotenvy::var("HONEYCOMB_API_KEY")
        .ok()
        .filter(|key| !key.is_empty());

    match api_key {
        Some(key) => {
            let tracer_provider = init_tracer_provider(&key)?;
            let tracer = tracer_provider.tracer(env!("CARGO_PKG_NAME"));

            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .with(OpenTelemetryLayer::new(tracer))
                .try_init()
                .context("Failed to install tracing subscriber")?;

            Ok(Some(OtelGuard { tracer_provider }))
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()
                .context("Failed to install tracing subscriber")?;

            Ok(None)
        }
    }
}

pub fn shutdown_telemetry() {
    let guard = match TELEMETRY_GUARD.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    };

    if guard.is_some() {
        tracing::info!("Flushing telemetry");
    }
    drop(guard);
}
