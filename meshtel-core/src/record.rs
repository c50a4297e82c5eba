use bytes::Bytes;

use crate::labels::{LabelMap, RawLabels};
use crate::metrics::MetricName;
use crate::option::ActivationContext;

/// Numeric payload of a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Int(i64),
    Double(f64),
}

impl MetricValue {
    pub fn is_double(&self) -> bool {
        matches!(self, MetricValue::Double(_))
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Int(v) => v as f64,
            MetricValue::Double(v) => v,
        }
    }

    /// Non-negative integer view used by counters. Doubles are truncated.
    pub fn as_u64(&self) -> u64 {
        match *self {
            MetricValue::Int(v) => v.max(0) as u64,
            MetricValue::Double(v) => v.max(0.0) as u64,
        }
    }
}

/// One measurement produced by the call path, consumed once by the plugins
/// named in `identifier`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub name: MetricName,
    pub value: MetricValue,
    /// Raw labels, possibly including the decoded exchange bundle under
    /// [`EXCHANGE_LABEL_KEY`](crate::labels::EXCHANGE_LABEL_KEY).
    pub labels: RawLabels,
    /// Control-plane supplied optional labels (client side only).
    pub optional_labels: LabelMap,
    pub context: ActivationContext,
    /// Comma-joined identifiers of the plugins this record is routed to.
    pub identifier: String,
}

impl MetricRecord {
    /// Create a record. The context defaults to the side implied by `name`,
    /// with an empty target for clients and `xds_enabled = false` for servers.
    pub fn new(name: MetricName, value: MetricValue) -> Self {
        let context = if name.is_client() {
            ActivationContext::client("")
        } else {
            ActivationContext::server(false)
        };
        Self {
            name,
            value,
            labels: RawLabels::new(),
            optional_labels: LabelMap::new(),
            context,
            identifier: String::new(),
        }
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn labels(mut self, labels: RawLabels) -> Self {
        self.labels.extend(labels);
        self
    }

    pub fn optional_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.optional_labels.insert(key.into(), value.into());
        self
    }

    pub fn context(mut self, context: ActivationContext) -> Self {
        self.context = context;
        self
    }

    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    /// Identifiers of the plugins this record should reach.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.identifier
            .split(crate::PLUGIN_IDENTIFIER_SEP)
            .filter(|id| !id.is_empty())
    }
}

/// Finished span handed to exporters alongside stats.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    pub name: String,
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub status: String,
    pub attributes: LabelMap,
}
