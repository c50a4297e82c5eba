use std::collections::HashMap;

use opentelemetry_sdk::resource::EnvResourceDetector;
use opentelemetry_sdk::Resource;

pub const CANONICAL_SERVICE_ENV: &str = "CSM_CANONICAL_SERVICE_NAME";
pub const WORKLOAD_NAME_ENV: &str = "CSM_WORKLOAD_NAME";
pub const BOOTSTRAP_ENV: &str = "GRPC_XDS_BOOTSTRAP";
pub const BOOTSTRAP_CONFIG_ENV: &str = "GRPC_XDS_BOOTSTRAP_CONFIG";

/// Local inputs the CSM injector derives its labels from.
///
/// Captured once. [`from_env`](Self::from_env) reads the process environment
/// and the OpenTelemetry resource detectors; the setters let tests and custom
/// discovery supply the same data directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsmEnvironment {
    pub canonical_service: Option<String>,
    pub workload_name: Option<String>,
    /// Value of `GRPC_XDS_BOOTSTRAP`.
    pub bootstrap: Option<String>,
    /// Value of `GRPC_XDS_BOOTSTRAP_CONFIG`.
    pub bootstrap_config: Option<String>,
    /// Detected resource attributes, e.g. `cloud.platform`.
    pub resource: HashMap<String, String>,
}

impl CsmEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let resource = Resource::builder_empty()
            .with_detector(Box::new(EnvResourceDetector::new()))
            .build();
        Self {
            canonical_service: non_empty_var(CANONICAL_SERVICE_ENV),
            workload_name: non_empty_var(WORKLOAD_NAME_ENV),
            bootstrap: non_empty_var(BOOTSTRAP_ENV),
            bootstrap_config: non_empty_var(BOOTSTRAP_CONFIG_ENV),
            resource: HashMap::new(),
        }
        .with_resource(&resource)
    }

    pub fn with_canonical_service(mut self, name: &str) -> Self {
        self.canonical_service = Some(name.to_string());
        self
    }

    pub fn with_workload_name(mut self, name: &str) -> Self {
        self.workload_name = Some(name.to_string());
        self
    }

    pub fn with_bootstrap(mut self, value: &str) -> Self {
        self.bootstrap = Some(value.to_string());
        self
    }

    pub fn with_bootstrap_config(mut self, value: &str) -> Self {
        self.bootstrap_config = Some(value.to_string());
        self
    }

    pub fn with_resource_attribute(mut self, key: &str, value: &str) -> Self {
        self.resource.insert(key.to_string(), value.to_string());
        self
    }

    /// Copy every attribute of `resource`, overwriting existing keys.
    pub fn with_resource(mut self, resource: &Resource) -> Self {
        for (key, value) in resource.iter() {
            self.resource
                .insert(key.as_str().to_string(), value.as_str().into_owned());
        }
        self
    }

    pub(crate) fn resource_attr(&self, key: &str) -> Option<&str> {
        self.resource
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
