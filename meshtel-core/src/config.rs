use std::time::Duration;

use serde::Deserialize;

use crate::error::ObservabilityError;

/// Default interval between two export batches.
pub const DEFAULT_EXPORT_INTERVAL: Duration = Duration::from_millis(500);

/// Shortest export interval the loop accepts.
pub const MIN_EXPORT_INTERVAL: Duration = Duration::from_millis(1);

/// Default capacity of the record queue feeding the export loop.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Configuration for the observability stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservabilityConfig {
    /// Service name reported in the metrics resource.
    pub service_name: String,
    /// Period of the batch-export loop.
    pub export_interval: Duration,
    /// Capacity of the bounded record queue. Records beyond it are dropped.
    pub queue_capacity: usize,
    /// Log output format: Pretty (default) or Json.
    pub log_format: LogFormat,
    /// OTLP/HTTP metrics endpoint. Only used with the `otlp` feature.
    pub otlp_endpoint: Option<String>,
    /// Additional resource attributes (key, value).
    pub resource_attributes: Vec<(String, String)>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::new("unknown_service")
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawSection {
    service_name: Option<String>,
    export_interval_ms: Option<u64>,
    queue_capacity: Option<usize>,
    log_format: Option<String>,
    otlp_endpoint: Option<String>,
    #[serde(default)]
    resource_attributes: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDocument {
    #[serde(default)]
    observability: Option<RawSection>,
}

impl ObservabilityConfig {
    /// Create a new config with the given service name and sensible defaults.
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            export_interval: DEFAULT_EXPORT_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            log_format: LogFormat::Pretty,
            otlp_endpoint: None,
            resource_attributes: Vec::new(),
        }
    }

    /// Set the export interval. Anything shorter than
    /// [`MIN_EXPORT_INTERVAL`] is raised to it.
    pub fn with_export_interval(mut self, interval: Duration) -> Self {
        self.export_interval = interval.max(MIN_EXPORT_INTERVAL);
        self
    }

    /// Set the queue capacity. Zero is raised to one.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.otlp_endpoint = Some(endpoint.to_string());
        self
    }

    pub fn with_resource_attribute(mut self, key: &str, value: &str) -> Self {
        self.resource_attributes
            .push((key.to_string(), value.to_string()));
        self
    }

    /// Load from a YAML document with an `observability` section.
    ///
    /// Reads keys like:
    /// - `observability.service-name`
    /// - `observability.export-interval-ms`
    /// - `observability.queue-capacity`
    /// - `observability.log-format`
    /// - `observability.otlp-endpoint`
    /// - `observability.resource-attributes.<key>`
    ///
    /// Missing keys keep their defaults; a missing section yields the default
    /// config for `service_name`.
    pub fn from_yaml_str(yaml: &str, service_name: &str) -> Result<Self, ObservabilityError> {
        let doc: RawDocument = serde_yaml::from_str(yaml)
            .map_err(|e| ObservabilityError::Config(e.to_string()))?;
        let mut cfg = Self::new(service_name);
        let Some(section) = doc.observability else {
            return Ok(cfg);
        };
        if let Some(name) = section.service_name {
            cfg.service_name = name;
        }
        if let Some(ms) = section.export_interval_ms {
            cfg.export_interval = export_interval_from_millis("export-interval-ms", ms)?;
        }
        if let Some(capacity) = section.queue_capacity {
            cfg = cfg.with_queue_capacity(capacity);
        }
        if let Some(format) = section.log_format {
            cfg.log_format = LogFormat::parse(&format);
        }
        cfg.otlp_endpoint = section.otlp_endpoint.or(cfg.otlp_endpoint);
        cfg.resource_attributes
            .extend(section.resource_attributes);
        Ok(cfg)
    }

    /// Overlay `MESHTEL_*` environment variables on top of `self`.
    ///
    /// Numeric variables that fail to parse are reported as
    /// [`ObservabilityError::Config`].
    pub fn from_env(self) -> Result<Self, ObservabilityError> {
        self.overlay(|key| std::env::var(key).ok())
    }

    fn overlay(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ObservabilityError> {
        if let Some(name) = lookup("MESHTEL_SERVICE_NAME") {
            self.service_name = name;
        }
        if let Some(ms) = lookup("MESHTEL_EXPORT_INTERVAL_MS") {
            let ms: u64 = ms.parse().map_err(|_| {
                ObservabilityError::Config(format!(
                    "MESHTEL_EXPORT_INTERVAL_MS is not a number: '{ms}'"
                ))
            })?;
            self.export_interval = export_interval_from_millis("MESHTEL_EXPORT_INTERVAL_MS", ms)?;
        }
        if let Some(capacity) = lookup("MESHTEL_QUEUE_CAPACITY") {
            let capacity: usize = capacity.parse().map_err(|_| {
                ObservabilityError::Config(format!(
                    "MESHTEL_QUEUE_CAPACITY is not a number: '{capacity}'"
                ))
            })?;
            self = self.with_queue_capacity(capacity);
        }
        if let Some(format) = lookup("MESHTEL_LOG_FORMAT") {
            self.log_format = LogFormat::parse(&format);
        }
        if let Some(endpoint) = lookup("MESHTEL_OTLP_ENDPOINT") {
            self.otlp_endpoint = Some(endpoint);
        }
        Ok(self)
    }
}

fn export_interval_from_millis(key: &str, ms: u64) -> Result<Duration, ObservabilityError> {
    if ms == 0 {
        return Err(ObservabilityError::Config(format!(
            "{key} must be greater than zero"
        )));
    }
    Ok(Duration::from_millis(ms))
}
