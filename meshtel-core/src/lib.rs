//! Peer label exchange and metric recording for gRPC observability.
//!
//! A gRPC client and server exchange a small serialized bundle of
//! peer-identity labels through one metadata entry. The receiving side
//! decodes it, merges it with locally known labels, bounds label cardinality,
//! and records the call metric on a pre-registered OpenTelemetry instrument.
//!
//! Peer identification is pluggable: a [`PluginOption`] decides per call
//! whether its [`LabelInjector`] takes part, and a [`Plugin`] composes any
//! number of options over one meter provider. [`Observability`] runs one or
//! more plugins behind a batch-export loop.

pub mod bridge;
pub mod codec;
pub mod config;
pub mod error;
pub mod export;
pub mod exporter;
pub mod injector;
pub mod instrument;
pub mod labels;
pub mod metrics;
pub mod observability;
pub mod option;
pub mod plugin;
pub mod record;
pub mod telemetry;

/// Separator between plugin identifiers in a composite identifier.
pub const PLUGIN_IDENTIFIER_SEP: &str = ",";

pub use bridge::{AttributeFilter, MetricRecorder, RecordOutcome};
pub use config::{LogFormat, ObservabilityConfig};
pub use error::{ExportError, ObservabilityError};
pub use export::RecordSink;
pub use exporter::{Exporter, PluginExporter};
pub use injector::LabelInjector;
pub use instrument::{Instrument, OtelInstrument};
pub use labels::{
    EffectiveLabelSet, LabelBundle, LabelMap, LabelValue, RawLabels, EXCHANGE_LABEL_KEY,
    METHOD_LABEL, OTHER, PEER_METADATA_HEADER, STATUS_LABEL, TARGET_LABEL, UNKNOWN,
};
pub use metrics::{base_metrics, InstrumentKind, MetricName, OptionalLabel};
pub use observability::{Observability, ObservabilityBuilder};
pub use option::{ActivationContext, PluginOption};
pub use plugin::{Plugin, PluginBuilder};
pub use record::{MetricRecord, MetricValue, SpanRecord};
pub use telemetry::{init_telemetry, TelemetryGuard};
