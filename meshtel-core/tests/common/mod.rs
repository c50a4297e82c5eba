#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use meshtel_core::codec;
use meshtel_core::{
    Instrument, InstrumentKind, LabelBundle, LabelInjector, LabelMap, MetricValue, PluginOption,
    RawLabels, EXCHANGE_LABEL_KEY, UNKNOWN,
};
use opentelemetry::KeyValue;

/// Instrument double that remembers every update.
pub struct RecordingInstrument {
    kind: InstrumentKind,
    updates: Mutex<Vec<(MetricValue, BTreeMap<String, String>)>>,
}

impl RecordingInstrument {
    pub fn new(kind: InstrumentKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            updates: Mutex::new(Vec::new()),
        })
    }

    pub fn updates(&self) -> Vec<(MetricValue, BTreeMap<String, String>)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn last_labels(&self) -> BTreeMap<String, String> {
        self.updates().last().map(|(_, l)| l.clone()).unwrap_or_default()
    }
}

impl Instrument for RecordingInstrument {
    fn kind(&self) -> InstrumentKind {
        self.kind
    }

    fn update(&self, value: MetricValue, attributes: &[KeyValue]) {
        let labels = attributes
            .iter()
            .map(|kv| (kv.key.as_str().to_string(), kv.value.to_string()))
            .collect();
        self.updates.lock().unwrap().push((value, labels));
    }
}

/// Injector that sends a fixed bundle and maps the peer's `name` field to
/// `peer_key`.
pub struct StaticInjector {
    pub exchange: LabelBundle,
    pub additional: LabelBundle,
    pub peer_key: &'static str,
}

impl StaticInjector {
    pub fn new(exchange: LabelBundle, peer_key: &'static str) -> Self {
        Self {
            exchange,
            additional: LabelBundle::new(),
            peer_key,
        }
    }

    pub fn with_additional(mut self, additional: LabelBundle) -> Self {
        self.additional = additional;
        self
    }
}

impl LabelInjector for StaticInjector {
    fn labels_for_exchange(&self) -> &LabelBundle {
        &self.exchange
    }

    fn deserialize_and_merge(&self, incoming: &RawLabels) -> LabelMap {
        let remote = incoming
            .get(EXCHANGE_LABEL_KEY)
            .map(|raw| codec::decode(raw))
            .unwrap_or_default();
        let mut out = LabelMap::new();
        out.insert(
            self.peer_key.to_string(),
            codec::lookup_or_unknown(&remote, "name").to_string(),
        );
        out
    }

    fn additional_labels(&self) -> LabelBundle {
        self.additional.clone()
    }

    fn optional_labels(&self, is_client: bool, optional: &LabelMap) -> LabelMap {
        let mut out = LabelMap::new();
        if is_client {
            out.insert(
                "svc".to_string(),
                optional
                    .get("service_name")
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            );
        }
        out
    }
}

/// Option gated on a target prefix, active on every server.
pub struct PrefixOption {
    pub prefix: &'static str,
    pub injector: Option<StaticInjector>,
}

impl PrefixOption {
    pub fn new(prefix: &'static str, injector: StaticInjector) -> Self {
        Self {
            prefix,
            injector: Some(injector),
        }
    }

    pub fn without_injector(prefix: &'static str) -> Self {
        Self {
            prefix,
            injector: None,
        }
    }
}

impl PluginOption for PrefixOption {
    fn is_active_on_client(&self, target: &str) -> bool {
        target.starts_with(self.prefix)
    }

    fn is_active_on_server(&self, _xds_enabled: bool) -> bool {
        true
    }

    fn label_injector(&self) -> Option<&dyn LabelInjector> {
        self.injector.as_ref().map(|i| i as &dyn LabelInjector)
    }
}

/// Raw labels carrying an encoded peer bundle.
pub fn raw_with_peer(bundle: &LabelBundle) -> RawLabels {
    let mut raw = RawLabels::new();
    raw.insert(EXCHANGE_LABEL_KEY.to_string(), codec::encode(bundle));
    raw
}
