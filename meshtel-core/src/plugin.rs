use std::collections::{BTreeSet, BTreeMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use opentelemetry::metrics::MeterProvider;

use crate::bridge::{AttributeFilter, MetricRecorder, RecordOutcome};
use crate::instrument::{register_instruments, Instrument};
use crate::labels::{EffectiveLabelSet, LabelBundle};
use crate::metrics::{base_metrics, MetricName, OptionalLabel};
use crate::option::{ActivationContext, PluginOption};
use crate::record::MetricRecord;

static NEXT_PLUGIN_SEQ: AtomicU64 = AtomicU64::new(0);

fn next_identifier() -> String {
    let seq = NEXT_PLUGIN_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", std::process::id(), seq)
}

type SharedMeterProvider = Arc<dyn MeterProvider + Send + Sync>;

/// Builder for [`Plugin`].
///
/// ```ignore
/// let plugin = Plugin::builder()
///     .meter_provider(provider.clone())
///     .option(csm_option)
///     .target_attribute_filter(|target| target.starts_with("xds:"))
///     .known_methods(["helloworld.Greeter/SayHello"])
///     .build();
/// ```
pub struct PluginBuilder {
    options: Vec<Arc<dyn PluginOption>>,
    meter_provider: Option<SharedMeterProvider>,
    metrics: Vec<MetricName>,
    overrides: BTreeMap<MetricName, Arc<dyn Instrument>>,
    target_filter: Option<AttributeFilter>,
    method_filter: Option<AttributeFilter>,
    known_methods: Vec<String>,
    optional_labels: BTreeSet<OptionalLabel>,
}

impl Default for PluginBuilder {
    fn default() -> Self {
        Self {
            options: Vec::new(),
            meter_provider: None,
            metrics: base_metrics(),
            overrides: BTreeMap::new(),
            target_filter: None,
            method_filter: None,
            known_methods: Vec::new(),
            optional_labels: BTreeSet::new(),
        }
    }
}

impl PluginBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an option. Registration order is the merge order.
    pub fn option(self, option: impl PluginOption + 'static) -> Self {
        self.option_arc(Arc::new(option))
    }

    pub fn option_arc(mut self, option: Arc<dyn PluginOption>) -> Self {
        self.options.push(option);
        self
    }

    /// Meter provider instruments are registered on. Falls back to the
    /// global provider.
    pub fn meter_provider<P>(mut self, provider: P) -> Self
    where
        P: MeterProvider + Send + Sync + 'static,
    {
        self.meter_provider = Some(Arc::new(provider));
        self
    }

    /// Restrict the plugin to `metrics`. Records for any other metric are
    /// skipped.
    pub fn enable_metrics(mut self, metrics: impl IntoIterator<Item = MetricName>) -> Self {
        self.metrics = metrics.into_iter().collect();
        self
    }

    /// Use `instrument` for `name` instead of creating one on the meter.
    /// Also enables `name`.
    pub fn instrument(mut self, name: MetricName, instrument: Arc<dyn Instrument>) -> Self {
        if !self.metrics.contains(&name) {
            self.metrics.push(name);
        }
        self.overrides.insert(name, instrument);
        self
    }

    pub fn target_attribute_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.target_filter = Some(Arc::new(filter));
        self
    }

    pub fn generic_method_attribute_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.method_filter = Some(Arc::new(filter));
        self
    }

    /// Methods registered with the server or generated stubs. They are never
    /// passed through the generic-method filter.
    pub fn known_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_methods.extend(methods.into_iter().map(Into::into));
        self
    }

    pub fn enable_optional_label(mut self, label: OptionalLabel) -> Self {
        self.optional_labels.insert(label);
        self
    }

    pub fn build(self) -> Plugin {
        let PluginBuilder {
            options,
            meter_provider,
            metrics,
            mut overrides,
            target_filter,
            method_filter,
            known_methods,
            optional_labels,
        } = self;

        let to_register: Vec<MetricName> = metrics
            .iter()
            .copied()
            .filter(|m| !overrides.contains_key(m))
            .collect();
        let mut instruments = if to_register.is_empty() {
            Default::default()
        } else {
            let provider =
                meter_provider.unwrap_or_else(opentelemetry::global::meter_provider);
            register_instruments(provider.as_ref(), &to_register)
        };
        for name in metrics {
            if let Some(instrument) = overrides.remove(&name) {
                instruments.insert(name, instrument);
            }
        }

        let recorder = MetricRecorder::new(instruments)
            .with_target_filter(target_filter)
            .with_method_filter(method_filter)
            .with_known_methods(known_methods);

        let plugin = Plugin {
            identifier: next_identifier(),
            options,
            optional_labels,
            recorder,
        };
        tracing::debug!(
            identifier = %plugin.identifier,
            options = plugin.options.len(),
            "Built observability plugin"
        );
        plugin
    }
}

/// Composes plugin options over one meter provider.
///
/// Options are kept in registration order. When two active options put the
/// same key in a bundle, the later one wins.
pub struct Plugin {
    identifier: String,
    options: Vec<Arc<dyn PluginOption>>,
    optional_labels: BTreeSet<OptionalLabel>,
    recorder: MetricRecorder,
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("identifier", &self.identifier)
            .field("options", &self.options.len())
            .field("optional_labels", &self.optional_labels)
            .field("recorder", &self.recorder)
            .finish()
    }
}

impl Plugin {
    pub fn builder() -> PluginBuilder {
        PluginBuilder::new()
    }

    /// Process-unique identifier, `"{pid}-{seq}"`.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn options(&self) -> &[Arc<dyn PluginOption>] {
        &self.options
    }

    pub fn recorder(&self) -> &MetricRecorder {
        &self.recorder
    }

    pub fn enabled_optional_labels(&self) -> &BTreeSet<OptionalLabel> {
        &self.optional_labels
    }

    pub fn labels(&self, context: &ActivationContext) -> EffectiveLabelSet {
        let mut set = EffectiveLabelSet::default();
        for option in &self.options {
            if !context.activates(option.as_ref()) {
                continue;
            }
            if let Some(injector) = option.label_injector() {
                set.exchange.merge(injector.labels_for_exchange());
                set.additional.merge(&injector.additional_labels());
            }
        }
        set
    }

    pub fn client_labels(&self, target: &str) -> EffectiveLabelSet {
        self.labels(&ActivationContext::client(target))
    }

    pub fn server_labels(&self, xds_enabled: bool) -> EffectiveLabelSet {
        self.labels(&ActivationContext::server(xds_enabled))
    }

    /// Bundle to send to the server on a call to `target`.
    pub fn client_exchange_labels(&self, target: &str) -> LabelBundle {
        self.client_labels(target).exchange
    }

    /// Bundle to answer a client with.
    pub fn server_exchange_labels(&self, xds_enabled: bool) -> LabelBundle {
        self.server_labels(xds_enabled).exchange
    }

    /// Offer `record` to this plugin's recorder.
    pub fn maybe_record(&self, record: &MetricRecord) -> RecordOutcome {
        let optional = self
            .optional_labels
            .contains(&OptionalLabel::XdsServiceLabels);
        self.recorder.record(record, &self.options, optional)
    }
}
