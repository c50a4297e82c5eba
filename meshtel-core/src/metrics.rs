//! Catalog of the per-call gRPC metrics a plugin can subscribe to.

use std::fmt;
use std::str::FromStr;

/// Instrument type backing a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    Counter,
    Histogram,
}

const UNIT_ATTEMPT: &str = "{attempt}";
const UNIT_CALL: &str = "{call}";
const UNIT_SECONDS: &str = "s";
const UNIT_BYTES: &str = "By";

/// Identifier of a recordable metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricName {
    ClientAttemptStarted,
    ClientAttemptDuration,
    ClientCallDuration,
    ClientAttemptSentCompressedSize,
    ClientAttemptRcvdCompressedSize,
    ServerCallStarted,
    ServerCallDuration,
    ServerCallSentCompressedSize,
    ServerCallRcvdCompressedSize,
}

impl MetricName {
    pub const ALL: [MetricName; 9] = [
        MetricName::ClientAttemptStarted,
        MetricName::ClientAttemptDuration,
        MetricName::ClientCallDuration,
        MetricName::ClientAttemptSentCompressedSize,
        MetricName::ClientAttemptRcvdCompressedSize,
        MetricName::ServerCallStarted,
        MetricName::ServerCallDuration,
        MetricName::ServerCallSentCompressedSize,
        MetricName::ServerCallRcvdCompressedSize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ClientAttemptStarted => "grpc.client.attempt.started",
            MetricName::ClientAttemptDuration => "grpc.client.attempt.duration",
            MetricName::ClientCallDuration => "grpc.client.call.duration",
            MetricName::ClientAttemptSentCompressedSize => {
                "grpc.client.attempt.sent_total_compressed_message_size"
            }
            MetricName::ClientAttemptRcvdCompressedSize => {
                "grpc.client.attempt.rcvd_total_compressed_message_size"
            }
            MetricName::ServerCallStarted => "grpc.server.call.started",
            MetricName::ServerCallDuration => "grpc.server.call.duration",
            MetricName::ServerCallSentCompressedSize => {
                "grpc.server.call.sent_total_compressed_message_size"
            }
            MetricName::ServerCallRcvdCompressedSize => {
                "grpc.server.call.rcvd_total_compressed_message_size"
            }
        }
    }

    pub fn kind(&self) -> InstrumentKind {
        match self {
            MetricName::ClientAttemptStarted | MetricName::ServerCallStarted => {
                InstrumentKind::Counter
            }
            _ => InstrumentKind::Histogram,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MetricName::ClientAttemptStarted => UNIT_ATTEMPT,
            MetricName::ServerCallStarted => UNIT_CALL,
            MetricName::ClientAttemptDuration
            | MetricName::ClientCallDuration
            | MetricName::ServerCallDuration => UNIT_SECONDS,
            _ => UNIT_BYTES,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MetricName::ClientAttemptStarted => {
                "Number of client call attempts started"
            }
            MetricName::ClientAttemptDuration => {
                "End-to-end time taken to complete a client call attempt"
            }
            MetricName::ClientCallDuration => {
                "Time taken by gRPC to complete an RPC from application's perspective"
            }
            MetricName::ClientAttemptSentCompressedSize => {
                "Compressed message bytes sent per client call attempt"
            }
            MetricName::ClientAttemptRcvdCompressedSize => {
                "Compressed message bytes received per call attempt"
            }
            MetricName::ServerCallStarted => "Number of server calls started",
            MetricName::ServerCallDuration => {
                "End-to-end time taken to complete a call from server transport's perspective"
            }
            MetricName::ServerCallSentCompressedSize => {
                "Compressed message bytes sent per server call"
            }
            MetricName::ServerCallRcvdCompressedSize => {
                "Compressed message bytes received per server call"
            }
        }
    }

    pub fn is_client(&self) -> bool {
        self.as_str().starts_with("grpc.client.")
    }

    /// Started counters carry only the method and target, never peer or
    /// local identity labels.
    pub fn is_started(&self) -> bool {
        matches!(
            self,
            MetricName::ClientAttemptStarted | MetricName::ServerCallStarted
        )
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a metric name that is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMetric(pub String);

impl fmt::Display for UnknownMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown metric: {}", self.0)
    }
}

impl std::error::Error for UnknownMetric {}

impl FromStr for MetricName {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricName::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

/// Every metric in the catalog.
pub fn base_metrics() -> Vec<MetricName> {
    MetricName::ALL.to_vec()
}

/// Optional instrumentation a plugin can ask the transport to turn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OptionalLabel {
    /// `service_name` / `service_namespace` labels supplied by the xDS
    /// control plane for client calls.
    XdsServiceLabels,
}
