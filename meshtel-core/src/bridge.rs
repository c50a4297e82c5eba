//! Turns raw call-path records into instrument updates.
//!
//! Each record goes `RECEIVED -> SKIPPED | RECORDED`. A record is skipped when
//! its metric has no instrument registered for the plugin. Otherwise its
//! labels are decoded and merged by the active injectors, the target and
//! method are passed through their cardinality filters, and the instrument
//! is updated exactly once.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use opentelemetry::KeyValue;

use crate::instrument::InstrumentTable;
use crate::labels::{LabelMap, EXCHANGE_LABEL_KEY, METHOD_LABEL, OTHER, TARGET_LABEL};
use crate::option::{ActivationContext, PluginOption};
use crate::record::MetricRecord;

/// Cardinality filter. Returns `true` to keep the value verbatim and `false`
/// to replace it with [`OTHER`].
pub type AttributeFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Result of offering a record to a recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// No instrument is registered for the record's metric.
    Skipped,
    Recorded,
}

pub struct MetricRecorder {
    instruments: InstrumentTable,
    target_filter: Option<AttributeFilter>,
    method_filter: Option<AttributeFilter>,
    known_methods: HashSet<String>,
}

impl fmt::Debug for MetricRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRecorder")
            .field("instruments", &self.instruments.keys().collect::<Vec<_>>())
            .field("target_filter", &self.target_filter.is_some())
            .field("method_filter", &self.method_filter.is_some())
            .field("known_methods", &self.known_methods)
            .finish()
    }
}

impl MetricRecorder {
    pub fn new(instruments: InstrumentTable) -> Self {
        Self {
            instruments,
            target_filter: None,
            method_filter: None,
            known_methods: HashSet::new(),
        }
    }

    /// Without a target filter every target is kept.
    pub fn with_target_filter(mut self, filter: Option<AttributeFilter>) -> Self {
        self.target_filter = filter;
        self
    }

    /// Without a method filter every method outside the known set becomes
    /// [`OTHER`].
    pub fn with_method_filter(mut self, filter: Option<AttributeFilter>) -> Self {
        self.method_filter = filter;
        self
    }

    pub fn with_known_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_methods.extend(methods.into_iter().map(Into::into));
        self
    }

    pub fn has_instrument(&self, name: crate::metrics::MetricName) -> bool {
        self.instruments.contains_key(&name)
    }

    /// Record `record` using the injectors of `options` that are active for
    /// the record's context, in slice order.
    pub fn record(
        &self,
        record: &MetricRecord,
        options: &[Arc<dyn PluginOption>],
        optional_labels_enabled: bool,
    ) -> RecordOutcome {
        let Some(instrument) = self.instruments.get(&record.name) else {
            tracing::debug!(metric = %record.name, "No instrument registered, skipping record");
            return RecordOutcome::Skipped;
        };

        let labels = self.resolve_labels(record, options, optional_labels_enabled);
        let attributes: Vec<KeyValue> = labels
            .into_iter()
            .map(|(k, v)| KeyValue::new(k, v))
            .collect();
        instrument.update(record.value, &attributes);
        RecordOutcome::Recorded
    }

    /// Final attribute map for `record`, without touching any instrument.
    pub fn resolve_labels(
        &self,
        record: &MetricRecord,
        options: &[Arc<dyn PluginOption>],
        optional_labels_enabled: bool,
    ) -> LabelMap {
        let mut labels: LabelMap = record
            .labels
            .iter()
            .filter(|(k, _)| k.as_str() != EXCHANGE_LABEL_KEY)
            .map(|(k, v)| (k.clone(), String::from_utf8_lossy(v).into_owned()))
            .collect();

        if let ActivationContext::Client { target } = &record.context {
            if !target.is_empty() && !labels.contains_key(TARGET_LABEL) {
                labels.insert(TARGET_LABEL.to_string(), target.clone());
            }
        }

        if !record.name.is_started() {
            let is_client = record.context.is_client();
            for option in options {
                if !record.context.activates(option.as_ref()) {
                    continue;
                }
                let Some(injector) = option.label_injector() else {
                    continue;
                };
                labels.extend(injector.deserialize_and_merge(&record.labels));
                labels.extend(injector.additional_labels().to_label_map());
                if optional_labels_enabled {
                    labels.extend(injector.optional_labels(is_client, &record.optional_labels));
                }
            }
        }

        if let Some(target) = labels.get_mut(TARGET_LABEL) {
            let keep = self
                .target_filter
                .as_ref()
                .map_or(true, |filter| filter(target));
            if !keep {
                *target = OTHER.to_string();
            }
        }

        if let Some(method) = labels.get_mut(METHOD_LABEL) {
            if !self.known_methods.contains(method.as_str()) {
                let keep = self
                    .method_filter
                    .as_ref()
                    .map_or(false, |filter| filter(method));
                if !keep {
                    *method = OTHER.to_string();
                }
            }
        }

        labels
    }
}
