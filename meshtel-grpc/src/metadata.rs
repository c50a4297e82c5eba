use http::HeaderMap;
use meshtel_core::codec;
use meshtel_core::{LabelBundle, RawLabels, EXCHANGE_LABEL_KEY, PEER_METADATA_HEADER};
use tonic::metadata::{AsciiMetadataValue, MetadataMap};
use tonic::Code;

/// Header carrying the gRPC status code.
pub const GRPC_STATUS_HEADER: &str = "grpc-status";

/// Extract the peer's exchange bundle from gRPC metadata.
///
/// Returns raw labels holding the serialized bundle under
/// [`EXCHANGE_LABEL_KEY`], or an empty map when the peer sent nothing usable.
pub fn peer_labels_from_metadata(metadata: &MetadataMap) -> RawLabels {
    let value = metadata
        .get(PEER_METADATA_HEADER)
        .and_then(|v| v.to_str().ok());
    raw_labels(value)
}

/// Same as [`peer_labels_from_metadata`], on plain HTTP headers.
pub fn peer_labels_from_headers(headers: &HeaderMap) -> RawLabels {
    let value = headers
        .get(PEER_METADATA_HEADER)
        .and_then(|v| v.to_str().ok());
    raw_labels(value)
}

fn raw_labels(value: Option<&str>) -> RawLabels {
    let mut raw = RawLabels::new();
    match value.and_then(codec::from_header_value) {
        Some(bytes) => {
            raw.insert(EXCHANGE_LABEL_KEY.to_string(), bytes);
        }
        None if value.is_some() => {
            tracing::debug!("Ignoring malformed peer metadata header");
        }
        None => {}
    }
    raw
}

/// Metadata value for `bundle`, or `None` for an empty bundle.
pub fn exchange_metadata_value(bundle: &LabelBundle) -> Option<AsciiMetadataValue> {
    if bundle.is_empty() {
        return None;
    }
    // Base64 output is always valid ASCII metadata.
    codec::to_header_value(bundle).parse().ok()
}

/// Insert the exchange header for `bundle` into `metadata`.
pub fn insert_exchange_metadata(metadata: &mut MetadataMap, bundle: &LabelBundle) {
    if let Some(value) = exchange_metadata_value(bundle) {
        metadata.insert(PEER_METADATA_HEADER, value);
    }
}

/// Status code carried in `grpc-status`, if any.
pub fn status_from_headers(headers: &HeaderMap) -> Option<Code> {
    headers
        .get(GRPC_STATUS_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<i32>().ok())
        .map(Code::from_i32)
}

/// Canonical name of a status code, as used for the `grpc.status` label.
pub fn status_label(code: Code) -> &'static str {
    match code {
        Code::Ok => "OK",
        Code::Cancelled => "CANCELLED",
        Code::Unknown => "UNKNOWN",
        Code::InvalidArgument => "INVALID_ARGUMENT",
        Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
        Code::NotFound => "NOT_FOUND",
        Code::AlreadyExists => "ALREADY_EXISTS",
        Code::PermissionDenied => "PERMISSION_DENIED",
        Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
        Code::FailedPrecondition => "FAILED_PRECONDITION",
        Code::Aborted => "ABORTED",
        Code::OutOfRange => "OUT_OF_RANGE",
        Code::Unimplemented => "UNIMPLEMENTED",
        Code::Internal => "INTERNAL",
        Code::Unavailable => "UNAVAILABLE",
        Code::DataLoss => "DATA_LOSS",
        Code::Unauthenticated => "UNAUTHENTICATED",
    }
}
