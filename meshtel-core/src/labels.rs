//! Label types shared by injectors, the plugin composer and the recorder.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;

/// Sentinel used whenever a peer-identity field cannot be determined.
pub const UNKNOWN: &str = "unknown";

/// Sentinel substituted for high-cardinality target/method values.
pub const OTHER: &str = "other";

/// Key under which the decoded exchange bundle travels in a raw label map.
pub const EXCHANGE_LABEL_KEY: &str = "XEnvoyPeerMetadata";

/// Metadata header carrying the base64 exchange bundle on the wire.
pub const PEER_METADATA_HEADER: &str = "x-envoy-peer-metadata";

pub const METHOD_LABEL: &str = "grpc.method";
pub const TARGET_LABEL: &str = "grpc.target";
pub const STATUS_LABEL: &str = "grpc.status";

/// Raw labels as surfaced by the transport: string keys, opaque byte values.
pub type RawLabels = HashMap<String, Bytes>;

/// Final flat label map handed to an instrument as attributes.
pub type LabelMap = BTreeMap<String, String>;

/// A single label value. Exchange bundles cross the wire, so values may be
/// arbitrary bytes as well as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelValue {
    Str(String),
    Bytes(Bytes),
}

impl LabelValue {
    /// Text view of the value. Byte values are only returned when they are
    /// valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LabelValue::Str(s) => Some(s),
            LabelValue::Bytes(b) => std::str::from_utf8(b).ok(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            LabelValue::Str(s) => s.as_bytes(),
            LabelValue::Bytes(b) => b,
        }
    }
}

impl From<String> for LabelValue {
    fn from(value: String) -> Self {
        LabelValue::Str(value)
    }
}

impl From<&str> for LabelValue {
    fn from(value: &str) -> Self {
        LabelValue::Str(value.to_string())
    }
}

impl From<Bytes> for LabelValue {
    fn from(value: Bytes) -> Self {
        LabelValue::Bytes(value)
    }
}

impl From<Vec<u8>> for LabelValue {
    fn from(value: Vec<u8>) -> Self {
        LabelValue::Bytes(Bytes::from(value))
    }
}

/// Key-ordered bundle of labels.
///
/// Keys are unique; inserting an existing key replaces its value, and
/// [`merge`](Self::merge) applies the same last-write-wins rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelBundle {
    entries: BTreeMap<String, LabelValue>,
}

impl LabelBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<LabelValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<LabelValue>) -> Option<LabelValue> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&LabelValue> {
        self.entries.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(LabelValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LabelValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `other` into `self`; values from `other` win on key collision.
    pub fn merge(&mut self, other: &LabelBundle) {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    /// Flatten into a string map. Byte values that are not UTF-8 are
    /// converted lossily.
    pub fn to_label_map(&self) -> LabelMap {
        self.entries
            .iter()
            .map(|(k, v)| {
                let text = match v {
                    LabelValue::Str(s) => s.clone(),
                    LabelValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
                };
                (k.clone(), text)
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<LabelValue>> FromIterator<(K, V)> for LabelBundle {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bundle = LabelBundle::new();
        for (k, v) in iter {
            bundle.insert(k, v);
        }
        bundle
    }
}

/// Per-call result of composing every active injector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveLabelSet {
    /// Labels serialized and sent to the peer.
    pub exchange: LabelBundle,
    /// Labels merged in locally at recording time, never transmitted.
    pub additional: LabelBundle,
}
