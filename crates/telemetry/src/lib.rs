//! Observability setup for the medlens backend.
//!
//! - **Logging**: `tracing` with JSON or compact console output
//! - **Tracing export**: optional OpenTelemetry OTLP exporter (`otlp` feature)
//! - **Metrics**: Prometheus recorder rendered at `/metrics` (`prometheus` feature)
//! - **Error tracking**: optional Sentry integration (`sentry` feature)
//!
//! All features are enabled by default. Exporters stay inactive until their
//! endpoint or DSN is configured.

use tracing::Level;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "prometheus")]
pub use metrics_exporter_prometheus::PrometheusHandle;

#[cfg(feature = "otlp")]
use opentelemetry::KeyValue;
#[cfg(feature = "otlp")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "otlp")]
use opentelemetry_sdk::{
    Resource,
    trace::{Sampler, SdkTracerProvider},
};

/// Default service name reported to exporters.
pub const DEFAULT_SERVICE_NAME: &str = "medlens";

/// Noisy dependency targets capped below the application level.
const DEPENDENCY_DIRECTIVES: &[&str] = &[
    "sqlx::query=warn",
    "tower=info",
    "h2=info",
    "hyper=info",
    "hyper_util=info",
    "reqwest=info",
    "rustls=warn",
    "sentry=warn",
];

/// Telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to exported spans
    pub service_name: String,
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub log_level: String,
    /// Use JSON log format
    pub json_logs: bool,
    /// OpenTelemetry OTLP endpoint (optional)
    pub otlp_endpoint: Option<String>,
    /// Sentry DSN (optional)
    pub sentry_dsn: Option<String>,
    /// Environment name (e.g., "production", "development")
    pub environment: Option<String>,
    /// Application version
    pub version: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_level: "INFO".to_string(),
            json_logs: true,
            otlp_endpoint: None,
            sentry_dsn: None,
            environment: None,
            version: None,
        }
    }
}

/// Active telemetry handles that need graceful shutdown.
pub struct TelemetryGuard {
    #[cfg(feature = "otlp")]
    otel_provider: Option<SdkTracerProvider>,
    #[cfg(feature = "sentry")]
    _sentry_guard: Option<sentry::ClientInitGuard>,
}

impl TelemetryGuard {
    /// Flush and shut down exporters.
    pub fn shutdown(self) {
        #[cfg(feature = "otlp")]
        if let Some(provider) = self.otel_provider
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shutdown OpenTelemetry provider: {e}");
        }
    }
}

/// Install the Prometheus recorder and return the handle for the /metrics endpoint.
///
/// # Panics
/// Panics if a global metrics recorder is already installed.
#[cfg(feature = "prometheus")]
#[must_use]
pub fn init_metrics() -> PrometheusHandle {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

#[cfg(feature = "otlp")]
fn init_opentelemetry(config: &TelemetryConfig) -> Option<SdkTracerProvider> {
    let endpoint = config.otlp_endpoint.as_deref()?;

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(std::time::Duration::from_secs(5))
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            eprintln!("OTLP exporter disabled: {e}");
            return None;
        }
    };

    let resource = Resource::builder()
        .with_attributes([KeyValue::new("service.name", config.service_name.clone())])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(resource)
        .build();

    opentelemetry::global::set_tracer_provider(provider.clone());

    Some(provider)
}

#[cfg(feature = "sentry")]
fn init_sentry(config: &TelemetryConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: config.version.clone().map(Into::into),
            environment: config.environment.clone().map(Into::into),
            traces_sample_rate: 0.2,
            attach_stacktrace: true,
            // Uploaded images and chat messages are health data
            send_default_pii: false,
            ..Default::default()
        },
    ));

    guard.is_enabled().then_some(guard)
}

/// Parse a textual log level, defaulting to INFO.
#[must_use]
pub fn parse_level(level: &str) -> Level {
    match level.trim().to_uppercase().as_str() {
        "TRACE" => Level::TRACE,
        "DEBUG" => Level::DEBUG,
        "WARN" | "WARNING" => Level::WARN,
        "ERROR" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn build_env_filter(level: Level) -> EnvFilter {
    DEPENDENCY_DIRECTIVES.iter().fold(
        EnvFilter::from_default_env().add_directive(level.into()),
        |filter, directive| match directive.parse() {
            Ok(d) => filter.add_directive(d),
            Err(_) => filter,
        },
    )
}

/// Setup the logging/tracing stack.
///
/// Returns a guard that must be kept alive for the application lifetime.
///
/// # Panics
/// Panics if a global tracing subscriber is already installed.
#[must_use]
pub fn setup_telemetry(config: &TelemetryConfig) -> TelemetryGuard {
    let env_filter = build_env_filter(parse_level(&config.log_level));

    // Sentry must be initialized before the subscriber so the layer sees a client
    #[cfg(feature = "sentry")]
    let sentry_guard = init_sentry(config);

    #[cfg(feature = "otlp")]
    let otel_provider = init_opentelemetry(config);

    let fmt_layer = if config.json_logs {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_timer(ChronoLocal::new("%H:%M:%S%.3f".to_string()))
            .compact()
            .boxed()
    };

    #[cfg(feature = "otlp")]
    let otel_layer = otel_provider.as_ref().map(|provider| {
        use opentelemetry::trace::TracerProvider as _;
        let tracer = provider.tracer(config.service_name.clone());
        tracing_opentelemetry::layer().with_tracer(tracer)
    });
    #[cfg(not(feature = "otlp"))]
    let otel_layer: Option<tracing_subscriber::layer::Identity> = None;

    #[cfg(feature = "sentry")]
    let sentry_layer = sentry_guard.as_ref().map(|_| sentry_tracing::layer());
    #[cfg(not(feature = "sentry"))]
    let sentry_layer: Option<tracing_subscriber::layer::Identity> = None;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .with(sentry_layer)
        .init();

    #[cfg(feature = "sentry")]
    if config.sentry_dsn.is_some() && sentry_guard.is_none() {
        tracing::warn!("Sentry DSN provided but client not enabled");
    }

    TelemetryGuard {
        #[cfg(feature = "otlp")]
        otel_provider,
        #[cfg(feature = "sentry")]
        _sentry_guard: sentry_guard,
    }
}

/// Report an error to Sentry (if enabled).
#[cfg(feature = "sentry")]
pub fn capture_error<E: std::fmt::Display>(error: &E) {
    sentry::capture_message(&error.to_string(), sentry::Level::Error);
}

/// Report an error to Sentry (no-op without the `sentry` feature).
#[cfg(not(feature = "sentry"))]
pub fn capture_error<E: std::fmt::Display>(_error: &E) {}
