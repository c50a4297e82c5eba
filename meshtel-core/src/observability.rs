use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ObservabilityConfig;
use crate::error::ObservabilityError;
use crate::export::{self, RecordSink};
use crate::exporter::{Exporter, PluginExporter};
use crate::labels::{LabelBundle, METHOD_LABEL, STATUS_LABEL, TARGET_LABEL};
use crate::metrics::{MetricName, OptionalLabel};
use crate::option::ActivationContext;
use crate::plugin::Plugin;
use crate::record::{MetricRecord, MetricValue};
use crate::PLUGIN_IDENTIFIER_SEP;

/// Whether an observability session is running in this process.
static OBSERVABILITY_ACTIVE: Mutex<bool> = Mutex::new(false);

fn acquire_guard() -> Result<(), ObservabilityError> {
    let mut active = OBSERVABILITY_ACTIVE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if *active {
        return Err(ObservabilityError::AlreadyStarted);
    }
    *active = true;
    Ok(())
}

fn release_guard() {
    let mut active = OBSERVABILITY_ACTIVE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    *active = false;
}

/// Builder for [`Observability`].
pub struct ObservabilityBuilder {
    plugins: Vec<Arc<Plugin>>,
    exporter: Option<Arc<dyn Exporter>>,
    config: ObservabilityConfig,
}

impl ObservabilityBuilder {
    pub fn plugin(self, plugin: Plugin) -> Self {
        self.plugin_arc(Arc::new(plugin))
    }

    pub fn plugin_arc(mut self, plugin: Arc<Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Replace the default [`PluginExporter`].
    pub fn exporter(mut self, exporter: impl Exporter + 'static) -> Self {
        self.exporter = Some(Arc::new(exporter));
        self
    }

    pub fn config(mut self, config: ObservabilityConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Observability {
        let identifier = self
            .plugins
            .iter()
            .map(|p| p.identifier())
            .collect::<Vec<_>>()
            .join(PLUGIN_IDENTIFIER_SEP);
        let exporter: Arc<dyn Exporter> = match self.exporter {
            Some(exporter) => exporter,
            None => Arc::new(PluginExporter::new(self.plugins.clone())),
        };
        Observability {
            plugins: self.plugins,
            exporter,
            config: self.config,
            identifier,
            running: None,
        }
    }
}

struct Running {
    sink: RecordSink,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// An observability session: a set of plugins plus the export loop feeding
/// them.
///
/// Only one session may run per process at a time. The session is started
/// with [`start`](Self::start) and stopped with [`stop`](Self::stop).
///
/// Dropping a running session cancels its export loop and releases the
/// process guard at once. The loop still drains and flushes queued records,
/// but does so on its detached task, so a new session may start before that
/// final flush completes. Use [`stop`](Self::stop) to wait for it.
///
/// ```ignore
/// let mut obs = Observability::builder().plugin(plugin).build();
/// let sink = obs.start()?;
/// sink.submit(record);
/// obs.stop().await?;
/// ```
pub struct Observability {
    plugins: Vec<Arc<Plugin>>,
    exporter: Arc<dyn Exporter>,
    config: ObservabilityConfig,
    identifier: String,
    running: Option<Running>,
}

impl Observability {
    pub fn builder() -> ObservabilityBuilder {
        ObservabilityBuilder {
            plugins: Vec::new(),
            exporter: None,
            config: ObservabilityConfig::default(),
        }
    }

    /// Start the export loop and return the sink records are submitted to.
    ///
    /// Fails with [`ObservabilityError::AlreadyStarted`] if any session is
    /// already running in the process, and with
    /// [`ObservabilityError::NoRuntime`] outside a Tokio runtime.
    pub fn start(&mut self) -> Result<RecordSink, ObservabilityError> {
        if self.running.is_some() {
            return Err(ObservabilityError::AlreadyStarted);
        }
        tokio::runtime::Handle::try_current().map_err(|_| ObservabilityError::NoRuntime)?;
        acquire_guard()?;

        let (sink, rx) = export::channel(self.config.queue_capacity, &self.identifier);
        let cancel = CancellationToken::new();
        let handle = export::spawn_export_loop(
            rx,
            self.exporter.clone(),
            self.config.export_interval,
            cancel.clone(),
        );
        self.running = Some(Running {
            sink: sink.clone(),
            cancel,
            handle,
        });
        tracing::info!(
            identifier = %self.identifier,
            plugins = self.plugins.len(),
            "gRPC observability started"
        );
        Ok(sink)
    }

    /// Stop the export loop, wait for queued records to be exported, and
    /// release the process-wide guard.
    pub async fn stop(&mut self) -> Result<(), ObservabilityError> {
        let Some(running) = self.running.take() else {
            return Err(ObservabilityError::NotStarted);
        };
        running.cancel.cancel();
        drop(running.sink);
        if let Err(e) = running.handle.await {
            tracing::warn!(error = %e, "Export loop ended abnormally");
        }
        release_guard();
        tracing::info!(identifier = %self.identifier, "gRPC observability stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Sink of the running session.
    pub fn sink(&self) -> Option<&RecordSink> {
        self.running.as_ref().map(|r| &r.sink)
    }

    /// Identifiers of all plugins, joined with `,`.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn plugins(&self) -> &[Arc<Plugin>] {
        &self.plugins
    }

    pub fn config(&self) -> &ObservabilityConfig {
        &self.config
    }

    /// Exchange bundle for `context`, merged across plugins in registration
    /// order.
    pub fn exchange_labels(&self, context: &ActivationContext) -> LabelBundle {
        let mut bundle = LabelBundle::new();
        for plugin in &self.plugins {
            bundle.merge(&plugin.labels(context).exchange);
        }
        bundle
    }

    pub fn client_exchange_labels(&self, target: &str) -> LabelBundle {
        self.exchange_labels(&ActivationContext::client(target))
    }

    pub fn server_exchange_labels(&self, xds_enabled: bool) -> LabelBundle {
        self.exchange_labels(&ActivationContext::server(xds_enabled))
    }

    /// Union of the optional labels every plugin enabled.
    pub fn enabled_optional_labels(&self) -> BTreeSet<OptionalLabel> {
        self.plugins
            .iter()
            .flat_map(|p| p.enabled_optional_labels().iter().copied())
            .collect()
    }

    /// Server calls are traced whether or not the server is xDS managed.
    pub fn is_server_traced(&self, _xds_enabled: bool) -> bool {
        true
    }

    /// Submit a `grpc.client.call.duration` sample. Returns whether the
    /// record was queued.
    pub fn record_rpc_latency(
        &self,
        method: &str,
        target: &str,
        latency: Duration,
        status: &str,
    ) -> bool {
        let Some(sink) = self.sink() else {
            tracing::debug!(method, "Observability not running, dropping latency sample");
            return false;
        };
        let record = MetricRecord::new(
            MetricName::ClientCallDuration,
            MetricValue::Double(latency.as_secs_f64()),
        )
        .label(METHOD_LABEL, method.to_string())
        .label(TARGET_LABEL, target.to_string())
        .label(STATUS_LABEL, status.to_string())
        .context(ActivationContext::client(target));
        sink.submit(record)
    }
}

impl Drop for Observability {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            release_guard();
        }
    }
}
