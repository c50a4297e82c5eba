use std::sync::Arc;

use crate::bridge::RecordOutcome;
use crate::error::ExportError;
use crate::plugin::Plugin;
use crate::record::{MetricRecord, SpanRecord};

/// Receiver of export batches produced by the export loop.
///
/// Called from the export task; implementations must not block indefinitely.
pub trait Exporter: Send + Sync {
    fn export_stats(&self, records: Vec<MetricRecord>) -> Result<(), ExportError>;

    fn export_tracing(&self, spans: Vec<SpanRecord>) -> Result<(), ExportError>;
}

/// Exporter that hands each record to every plugin named in its identifier.
pub struct PluginExporter {
    plugins: Vec<Arc<Plugin>>,
}

impl PluginExporter {
    pub fn new(plugins: Vec<Arc<Plugin>>) -> Self {
        Self { plugins }
    }

    pub fn plugins(&self) -> &[Arc<Plugin>] {
        &self.plugins
    }

    /// Route one record. Returns how many plugins recorded it.
    pub fn route(&self, record: &MetricRecord) -> usize {
        let mut recorded = 0;
        for id in record.identifiers() {
            for plugin in self.plugins.iter().filter(|p| p.identifier() == id) {
                if plugin.maybe_record(record) == RecordOutcome::Recorded {
                    recorded += 1;
                }
            }
        }
        recorded
    }
}

impl Exporter for PluginExporter {
    fn export_stats(&self, records: Vec<MetricRecord>) -> Result<(), ExportError> {
        for record in &records {
            if self.route(record) == 0 {
                tracing::debug!(
                    metric = %record.name,
                    identifier = %record.identifier,
                    "Record matched no plugin instrument"
                );
            }
        }
        Ok(())
    }

    fn export_tracing(&self, spans: Vec<SpanRecord>) -> Result<(), ExportError> {
        tracing::debug!(count = spans.len(), "Dropping spans, no trace backend configured");
        Ok(())
    }
}
