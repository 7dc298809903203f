use opentelemetry::{global, metrics::MetricsError, trace::TraceError, KeyValue};
use opentelemetry_sdk::{
	metrics::{
		reader::{DefaultAggregationSelector, DefaultTemporalitySelector},
		MeterProviderBuilder, PeriodicReader, SdkMeterProvider,
	},
	runtime,
	trace::{BatchConfig, Sampler, Tracer},
	Resource,
};
use opentelemetry_semantic_conventions::{
	resource::{DEPLOYMENT_ENVIRONMENT, SERVICE_NAME, SERVICE_VERSION},
	SCHEMA_URL,
};
use tracing_opentelemetry::MetricsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Export is only set up when a collector is configured.
pub const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
	#[error("metrics: {0}")]
	Metrics(#[from] MetricsError),
	#[error("trace: {0}")]
	Trace(#[from] TraceError),
}

/// Constructs a [`Resource`] which describes the service.
fn resource() -> Resource {
	Resource::from_schema_url(
		[
			KeyValue::new(SERVICE_NAME, env!("CARGO_PKG_NAME")),
			KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
			KeyValue::new(
				DEPLOYMENT_ENVIRONMENT,
				if cfg!(debug_assertions) {
					"development"
				} else {
					"production"
				},
			),
		],
		SCHEMA_URL,
	)
}

/// Constructs an [`SdkMeterProvider`] exporting over OTLP every few seconds.
fn init_meter_provider() -> Result<SdkMeterProvider, TelemetryError> {
	let exporter = opentelemetry_otlp::new_exporter()
		.tonic()
		.build_metrics_exporter(
			Box::new(DefaultAggregationSelector::new()),
			Box::new(DefaultTemporalitySelector::new()),
		)?;

	let reader = PeriodicReader::builder(exporter, runtime::Tokio)
		.with_interval(std::time::Duration::from_secs(5))
		.build();

	let meter_provider = MeterProviderBuilder::default()
		.with_resource(resource())
		.with_reader(reader)
		.build();

	global::set_meter_provider(meter_provider.clone());

	Ok(meter_provider)
}

/// Constructs a [`Tracer`] that samples everything and exports in batches.
fn init_tracer() -> Result<Tracer, TelemetryError> {
	let tracer = opentelemetry_otlp::new_pipeline()
		.tracing()
		.with_trace_config(
			opentelemetry_sdk::trace::Config::default()
				.with_sampler(Sampler::TraceIdRatioBased(1.0))
				.with_resource(resource()),
		)
		.with_batch_config(BatchConfig::default())
		.with_exporter(opentelemetry_otlp::new_exporter().tonic())
		.install_batch(runtime::Tokio)?;

	Ok(tracer)
}

fn env_filter() -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes the tracing subscriber.
///
/// Logs always go to stdout, filtered through `RUST_LOG` (default `info`).
/// When [`OTLP_ENDPOINT_VAR`] is set, spans and metrics are exported too and
/// the returned guard flushes them when dropped.
pub fn init_tracing_subscriber() -> Option<OtelGuard> {
	let registry = tracing_subscriber::registry()
		.with(env_filter())
		.with(tracing_subscriber::fmt::layer().with_ansi(true));

	if std::env::var_os(OTLP_ENDPOINT_VAR).is_none() {
		registry.init();
		return None;
	}

	match init_meter_provider().and_then(|meter_provider| Ok((meter_provider, init_tracer()?))) {
		Ok((meter_provider, tracer)) => {
			registry
				.with(MetricsLayer::new(meter_provider.clone()))
				.with(tracing_opentelemetry::layer().with_tracer(tracer))
				.init();

			Some(OtelGuard { meter_provider })
		}
		Err(error) => {
			registry.init();
			tracing::warn!(%error, "OpenTelemetry export disabled");

			None
		}
	}
}

pub struct OtelGuard {
	meter_provider: SdkMeterProvider,
}

impl Drop for OtelGuard {
	fn drop(&mut self) {
		if let Err(err) = self.meter_provider.shutdown() {
			eprintln!("{err:?}");
		}

		global::shutdown_tracer_provider();
	}
}
