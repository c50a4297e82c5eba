//! Record queue and the batch-export loop draining it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::MIN_EXPORT_INTERVAL;
use crate::exporter::Exporter;
use crate::record::MetricRecord;

/// Producer half of the record queue, handed to the call path.
///
/// Submitting never blocks. When the queue is full or the export loop has
/// stopped the record is dropped.
#[derive(Clone)]
pub struct RecordSink {
    tx: mpsc::Sender<MetricRecord>,
    identifier: Arc<str>,
}

impl std::fmt::Debug for RecordSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSink")
            .field("identifier", &self.identifier)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl RecordSink {
    /// Identifier stamped on records submitted without one.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Queue `record` for export. Returns whether it was accepted.
    pub fn submit(&self, mut record: MetricRecord) -> bool {
        if record.identifier.is_empty() {
            record.identifier = self.identifier.to_string();
        }
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(TrySendError::Full(record)) => {
                tracing::debug!(metric = %record.name, "Record queue full, dropping sample");
                false
            }
            Err(TrySendError::Closed(record)) => {
                tracing::debug!(metric = %record.name, "Export loop stopped, dropping sample");
                false
            }
        }
    }
}

/// Create a bounded record queue.
pub fn channel(capacity: usize, identifier: &str) -> (RecordSink, mpsc::Receiver<MetricRecord>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sink = RecordSink {
        tx,
        identifier: Arc::from(identifier),
    };
    (sink, rx)
}

/// Spawn the export loop on the current runtime.
///
/// Records are buffered and handed to `exporter` every `interval`. On
/// cancellation the queue is closed, drained, and flushed one last time
/// before the task ends.
pub fn spawn_export_loop(
    rx: mpsc::Receiver<MetricRecord>,
    exporter: Arc<dyn Exporter>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_ms = interval.as_millis() as u64, "Export loop started");
        run_export_loop(rx, exporter.as_ref(), interval, cancel).await;
        tracing::info!("Export loop stopped");
    })
}

async fn run_export_loop(
    mut rx: mpsc::Receiver<MetricRecord>,
    exporter: &dyn Exporter,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut buffer = Vec::new();
    let mut tick = tokio::time::interval(interval.max(MIN_EXPORT_INTERVAL));
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(record) => buffer.push(record),
                None => break,
            },
            _ = tick.tick() => flush(exporter, &mut buffer),
            _ = cancel.cancelled() => break,
        }
    }

    rx.close();
    while let Ok(record) = rx.try_recv() {
        buffer.push(record);
    }
    flush(exporter, &mut buffer);
}

fn flush(exporter: &dyn Exporter, buffer: &mut Vec<MetricRecord>) {
    if buffer.is_empty() {
        return;
    }
    let batch = std::mem::take(buffer);
    let count = batch.len();
    match exporter.export_stats(batch) {
        Ok(()) => tracing::debug!(count, "Exported stats batch"),
        Err(e) => tracing::warn!(count, error = %e, "Failed to export stats batch"),
    }
}
