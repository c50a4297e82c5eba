use std::time::Duration;

use meshtel_core::{
    ActivationContext, LabelBundle, MetricName, MetricRecord, MetricValue, Observability,
    RawLabels, METHOD_LABEL, PEER_METADATA_HEADER, STATUS_LABEL, TARGET_LABEL,
};
use tonic::metadata::AsciiMetadataValue;
use tonic::service::Interceptor;
use tonic::{Code, Request, Status};

use crate::metadata::{exchange_metadata_value, status_label};

/// Client interceptor attaching the local exchange bundle to every call.
///
/// The header value is computed once, for the channel's target.
///
/// ```ignore
/// let interceptor = PeerMetadataInterceptor::for_target(&obs, "xds:///greeter");
/// let client = GreeterClient::with_interceptor(channel, interceptor);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PeerMetadataInterceptor {
    value: Option<AsciiMetadataValue>,
}

impl PeerMetadataInterceptor {
    /// Bundle merged from every plugin active for `target`.
    pub fn for_target(observability: &Observability, target: &str) -> Self {
        Self::from_bundle(&observability.client_exchange_labels(target))
    }

    pub fn from_bundle(bundle: &LabelBundle) -> Self {
        Self {
            value: exchange_metadata_value(bundle),
        }
    }

    /// Whether calls through this interceptor carry an exchange header.
    pub fn is_active(&self) -> bool {
        self.value.is_some()
    }
}

impl Interceptor for PeerMetadataInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if let Some(value) = &self.value {
            request
                .metadata_mut()
                .insert(PEER_METADATA_HEADER, value.clone());
        }
        Ok(request)
    }
}

/// Build a `grpc.client.call.duration` record for a finished call.
///
/// `peer` is usually the result of
/// [`peer_labels_from_metadata`](crate::peer_labels_from_metadata) on the
/// response headers.
pub fn client_call_record(
    method: &str,
    target: &str,
    elapsed: Duration,
    code: Code,
    peer: RawLabels,
) -> MetricRecord {
    MetricRecord::new(
        MetricName::ClientCallDuration,
        MetricValue::Double(elapsed.as_secs_f64()),
    )
    .label(METHOD_LABEL, method.to_string())
    .label(TARGET_LABEL, target.to_string())
    .label(STATUS_LABEL, status_label(code))
    .labels(peer)
    .context(ActivationContext::client(target))
}
