//! meshtel: peer label exchange and metric recording for gRPC services.
//!
//! This facade crate re-exports the meshtel sub-crates through a single
//! dependency with feature flags. Import everything you need with:
//!
//! ```ignore
//! use meshtel::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature | Default | Crate                 |
//! |---------|---------|-----------------------|
//! | `csm`   | **yes** | `meshtel-csm`         |
//! | `grpc`  | **yes** | `meshtel-grpc`        |
//! | `otlp`  | no      | `meshtel-core/otlp`   |
//! | `full`  | no      | All of the above      |
//!
//! # Example
//!
//! ```ignore
//! let config = ObservabilityConfig::new("greeter").from_env()?;
//! let telemetry = init_telemetry(&config)?;
//!
//! let plugin = meshtel::csm::csm_plugin(CsmPluginOption::from_env())
//!     .meter_provider(telemetry.meter_provider())
//!     .known_methods(["helloworld.Greeter/SayHello"])
//!     .build();
//!
//! let mut observability = Observability::builder()
//!     .plugin(plugin)
//!     .config(config)
//!     .build();
//! observability.start()?;
//!
//! let layer = PeerExchangeLayer::from_observability(&observability, false)?;
//! // ... serve with `layer`, then:
//! observability.stop().await?;
//! ```

pub extern crate meshtel_core;

// Re-export everything from meshtel-core at the top level for convenience.
pub use meshtel_core::*;

#[cfg(feature = "csm")]
pub use meshtel_csm as csm;

#[cfg(feature = "grpc")]
pub use meshtel_grpc as grpc;

/// Unified prelude. Import everything with `use meshtel::prelude::*`.
pub mod prelude {
    pub use meshtel_core::{
        init_telemetry, ActivationContext, Exporter, LabelBundle, LabelInjector, MetricName,
        MetricRecord, MetricValue, Observability, ObservabilityConfig, ObservabilityError,
        OptionalLabel, Plugin, PluginOption, RecordOutcome, RecordSink,
    };

    #[cfg(feature = "csm")]
    pub use meshtel_csm::{CsmEnvironment, CsmLabelInjector, CsmPluginOption};

    #[cfg(feature = "grpc")]
    pub use meshtel_grpc::{PeerExchangeLayer, PeerMetadataInterceptor};
}
