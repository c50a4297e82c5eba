use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::Resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::error::ObservabilityError;

/// Initialize console logging and build the meter provider plugins record
/// into.
///
/// Installing the subscriber uses `try_init`, so a process that already has
/// one keeps it. With the `otlp` feature and an endpoint configured, metrics
/// are pushed over OTLP/HTTP every `export_interval`.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<TelemetryGuard, ObservabilityError> {
    init_logging(config.log_format);

    let mut resource_kv = vec![KeyValue::new(
        opentelemetry_semantic_conventions::attribute::SERVICE_NAME,
        config.service_name.clone(),
    )];
    for (k, v) in &config.resource_attributes {
        resource_kv.push(KeyValue::new(k.clone(), v.clone()));
    }
    let resource = Resource::builder().with_attributes(resource_kv).build();

    #[allow(unused_mut)]
    let mut provider_builder = SdkMeterProvider::builder().with_resource(resource);

    #[cfg(feature = "otlp")]
    {
        use opentelemetry_otlp::WithExportConfig;
        if let Some(endpoint) = &config.otlp_endpoint {
            let exporter = opentelemetry_otlp::MetricExporter::builder()
                .with_http()
                .with_endpoint(endpoint)
                .build()
                .map_err(|e| ObservabilityError::Telemetry(e.to_string()))?;
            let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
                .with_interval(config.export_interval)
                .build();
            provider_builder = provider_builder.with_reader(reader);
        }
    }

    #[cfg(not(feature = "otlp"))]
    {
        if config.otlp_endpoint.is_some() {
            tracing::warn!("OTLP endpoint configured but the `otlp` feature is disabled");
        }
    }

    let provider = provider_builder.build();
    tracing::info!(service = %config.service_name, "Telemetry initialized");
    Ok(TelemetryGuard { provider })
}

fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false);
            Registry::default().with(env_filter).with(fmt_layer).try_init()
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false);
            Registry::default().with(env_filter).with(fmt_layer).try_init()
        }
    };
    if result.is_err() {
        tracing::debug!("Global subscriber already installed, keeping it");
    }
}

/// Guard that flushes and shuts the meter provider down on drop.
pub struct TelemetryGuard {
    provider: SdkMeterProvider,
}

impl TelemetryGuard {
    /// Provider to hand to [`PluginBuilder::meter_provider`](crate::PluginBuilder::meter_provider).
    pub fn meter_provider(&self) -> SdkMeterProvider {
        self.provider.clone()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Err(e) = self.provider.shutdown() {
            eprintln!("Failed to shut down OpenTelemetry meter provider: {e}");
        }
    }
}
