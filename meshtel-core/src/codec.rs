//! Binary encoding of exchange bundles.
//!
//! A bundle is carried as a serialized `google.protobuf.Struct`, the format
//! Envoy and the other gRPC implementations use for `x-envoy-peer-metadata`.
//! On the wire the serialized bytes are base64 encoded
//! ([`to_header_value`] / [`from_header_value`]).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use prost::Message;
use prost_types::value::Kind;
use prost_types::{Struct, Value};

use crate::labels::{LabelBundle, LabelValue, UNKNOWN};

/// Field name used inside the nested struct that wraps a byte value.
const BYTES_FIELD: &str = "bytes";

/// Serialize a bundle into an opaque byte string.
pub fn encode(bundle: &LabelBundle) -> Bytes {
    let fields = bundle
        .iter()
        .map(|(key, value)| (key.to_string(), encode_value(value)))
        .collect();
    Bytes::from(Struct { fields }.encode_to_vec())
}

/// Deserialize a bundle. Malformed or empty input yields an empty bundle.
pub fn decode(bytes: &[u8]) -> LabelBundle {
    if bytes.is_empty() {
        return LabelBundle::new();
    }
    match Struct::decode(bytes) {
        Ok(pb) => pb
            .fields
            .into_iter()
            .filter_map(|(key, value)| decode_value(value).map(|v| (key, v)))
            .collect(),
        Err(e) => {
            tracing::debug!(error = %e, "Discarding malformed exchange bundle");
            LabelBundle::new()
        }
    }
}

/// Look up a text value, falling back to [`UNKNOWN`].
pub fn lookup_or_unknown<'a>(bundle: &'a LabelBundle, key: &str) -> &'a str {
    bundle.get_str(key).unwrap_or(UNKNOWN)
}

/// Encode a bundle for transport in a text metadata header.
pub fn to_header_value(bundle: &LabelBundle) -> String {
    STANDARD.encode(encode(bundle))
}

/// Undo [`to_header_value`]'s base64 layer. Returns `None` for empty or
/// invalid input.
pub fn from_header_value(value: &str) -> Option<Bytes> {
    if value.is_empty() {
        return None;
    }
    STANDARD.decode(value).ok().map(Bytes::from)
}

fn encode_value(value: &LabelValue) -> Value {
    let kind = match value {
        LabelValue::Str(s) => Kind::StringValue(s.clone()),
        LabelValue::Bytes(b) => {
            let mut inner = Struct::default();
            inner.fields.insert(
                BYTES_FIELD.to_string(),
                Value {
                    kind: Some(Kind::StringValue(STANDARD.encode(b))),
                },
            );
            Kind::StructValue(inner)
        }
    };
    Value { kind: Some(kind) }
}

fn decode_value(value: Value) -> Option<LabelValue> {
    match value.kind? {
        Kind::StringValue(s) => Some(LabelValue::Str(s)),
        Kind::NumberValue(n) => Some(LabelValue::Str(n.to_string())),
        Kind::BoolValue(b) => Some(LabelValue::Str(b.to_string())),
        Kind::StructValue(inner) => {
            if inner.fields.len() != 1 {
                return None;
            }
            match inner.fields.get(BYTES_FIELD)?.kind.as_ref()? {
                Kind::StringValue(encoded) => STANDARD
                    .decode(encoded)
                    .ok()
                    .map(|raw| LabelValue::Bytes(Bytes::from(raw))),
                _ => None,
            }
        }
        Kind::NullValue(_) | Kind::ListValue(_) => None,
    }
}
