mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{PrefixOption, RecordingInstrument, StaticInjector};
use meshtel_core::{
    ExportError, Exporter, InstrumentKind, LabelBundle, MetricName, MetricRecord, MetricValue,
    Observability, ObservabilityConfig, ObservabilityError, OptionalLabel, Plugin, SpanRecord,
    STATUS_LABEL,
};
use serial_test::serial;

#[derive(Clone, Default)]
struct CollectingExporter {
    batches: Arc<Mutex<Vec<Vec<MetricRecord>>>>,
    fail: bool,
}

impl CollectingExporter {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn records(&self) -> Vec<MetricRecord> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

impl Exporter for CollectingExporter {
    fn export_stats(&self, records: Vec<MetricRecord>) -> Result<(), ExportError> {
        self.batches.lock().unwrap().push(records);
        if self.fail {
            return Err(ExportError::Unavailable("collector down".into()));
        }
        Ok(())
    }

    fn export_tracing(&self, _spans: Vec<SpanRecord>) -> Result<(), ExportError> {
        Ok(())
    }
}

fn slow_config() -> ObservabilityConfig {
    ObservabilityConfig::new("test").with_export_interval(Duration::from_secs(3600))
}

fn empty_plugin() -> Plugin {
    Plugin::builder().enable_metrics(std::iter::empty()).build()
}

#[tokio::test]
#[serial]
async fn second_start_in_process_is_rejected() {
    let mut first = Observability::builder().plugin(empty_plugin()).build();
    let mut second = Observability::builder().plugin(empty_plugin()).build();

    first.start().unwrap();
    assert!(matches!(second.start(), Err(ObservabilityError::AlreadyStarted)));
    assert!(matches!(first.start(), Err(ObservabilityError::AlreadyStarted)));

    first.stop().await.unwrap();
    second.start().unwrap();
    second.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn stop_without_start_is_rejected() {
    let mut obs = Observability::builder().plugin(empty_plugin()).build();
    assert!(matches!(obs.stop().await, Err(ObservabilityError::NotStarted)));

    obs.start().unwrap();
    obs.stop().await.unwrap();
    assert!(matches!(obs.stop().await, Err(ObservabilityError::NotStarted)));
}

#[tokio::test]
#[serial]
async fn dropping_running_session_releases_guard() {
    {
        let mut obs = Observability::builder().plugin(empty_plugin()).build();
        obs.start().unwrap();
    }
    let mut next = Observability::builder().plugin(empty_plugin()).build();
    next.start().unwrap();
    next.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn dropped_session_flushes_on_its_detached_task() {
    let exporter = CollectingExporter::default();
    {
        let mut obs = Observability::builder()
            .plugin(empty_plugin())
            .exporter(exporter.clone())
            .config(slow_config())
            .build();
        let sink = obs.start().unwrap();
        for _ in 0..3 {
            assert!(sink.submit(MetricRecord::new(
                MetricName::ServerCallStarted,
                MetricValue::Int(1)
            )));
        }
    }

    for _ in 0..100 {
        if exporter.records().len() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(exporter.records().len(), 3);
}

#[test]
#[serial]
fn start_outside_runtime_fails() {
    let mut obs = Observability::builder().plugin(empty_plugin()).build();
    assert!(matches!(obs.start(), Err(ObservabilityError::NoRuntime)));
}

#[tokio::test]
#[serial]
async fn stop_drains_queued_records() {
    let exporter = CollectingExporter::default();
    let mut obs = Observability::builder()
        .plugin(empty_plugin())
        .exporter(exporter.clone())
        .config(slow_config())
        .build();
    let sink = obs.start().unwrap();

    for _ in 0..10 {
        assert!(sink.submit(MetricRecord::new(
            MetricName::ServerCallStarted,
            MetricValue::Int(1)
        )));
    }
    obs.stop().await.unwrap();

    let records = exporter.records();
    assert_eq!(records.len(), 10);
    assert!(records.iter().all(|r| r.identifier == obs.identifier()));
    assert!(!sink.submit(MetricRecord::new(MetricName::ServerCallStarted, MetricValue::Int(1))));
}

#[tokio::test]
#[serial]
async fn zero_interval_set_directly_still_exports() {
    let exporter = CollectingExporter::default();
    let mut config = ObservabilityConfig::new("test");
    config.export_interval = Duration::ZERO;
    let mut obs = Observability::builder()
        .plugin(empty_plugin())
        .exporter(exporter.clone())
        .config(config)
        .build();
    let sink = obs.start().unwrap();

    assert!(sink.submit(MetricRecord::new(MetricName::ServerCallStarted, MetricValue::Int(1))));
    obs.stop().await.unwrap();

    assert_eq!(exporter.records().len(), 1);
}

#[tokio::test]
#[serial]
async fn exporter_failure_does_not_stop_the_loop() {
    let exporter = CollectingExporter::failing();
    let mut obs = Observability::builder()
        .plugin(empty_plugin())
        .exporter(exporter.clone())
        .config(ObservabilityConfig::new("test").with_export_interval(Duration::from_millis(10)))
        .build();
    let sink = obs.start().unwrap();

    sink.submit(MetricRecord::new(MetricName::ServerCallStarted, MetricValue::Int(1)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    sink.submit(MetricRecord::new(MetricName::ServerCallStarted, MetricValue::Int(1)));
    obs.stop().await.unwrap();

    assert_eq!(exporter.records().len(), 2);
}

#[tokio::test]
#[serial]
async fn full_queue_drops_samples() {
    let exporter = CollectingExporter::default();
    let mut obs = Observability::builder()
        .plugin(empty_plugin())
        .exporter(exporter.clone())
        .config(slow_config().with_queue_capacity(2))
        .build();
    let sink = obs.start().unwrap();

    let accepted = (0..64)
        .filter(|_| sink.submit(MetricRecord::new(MetricName::ServerCallStarted, MetricValue::Int(1))))
        .count();
    assert!(accepted < 64);
    obs.stop().await.unwrap();
}

#[tokio::test]
#[serial]
async fn records_are_routed_to_named_plugins_only() {
    let a_calls = RecordingInstrument::new(InstrumentKind::Histogram);
    let b_calls = RecordingInstrument::new(InstrumentKind::Histogram);
    let a = Plugin::builder()
        .enable_metrics(std::iter::empty())
        .instrument(MetricName::ClientCallDuration, a_calls.clone())
        .build();
    let b = Plugin::builder()
        .enable_metrics(std::iter::empty())
        .instrument(MetricName::ClientCallDuration, b_calls.clone())
        .build();
    let a_id = a.identifier().to_string();

    let mut obs = Observability::builder()
        .plugin(a)
        .plugin(b)
        .config(slow_config())
        .build();
    let sink = obs.start().unwrap();

    sink.submit(
        MetricRecord::new(MetricName::ClientCallDuration, MetricValue::Double(0.1))
            .identifier(a_id),
    );
    sink.submit(MetricRecord::new(MetricName::ClientCallDuration, MetricValue::Double(0.2)));
    obs.stop().await.unwrap();

    assert_eq!(a_calls.updates().len(), 2);
    assert_eq!(b_calls.updates().len(), 1);
}

#[tokio::test]
#[serial]
async fn record_rpc_latency_reports_seconds_and_status() {
    let calls = RecordingInstrument::new(InstrumentKind::Histogram);
    let plugin = Plugin::builder()
        .enable_metrics(std::iter::empty())
        .instrument(MetricName::ClientCallDuration, calls.clone())
        .known_methods(["pkg.Svc/Get"])
        .build();
    let mut obs = Observability::builder()
        .plugin(plugin)
        .config(slow_config())
        .build();

    assert!(!obs.record_rpc_latency("pkg.Svc/Get", "dns:///svc", Duration::from_millis(1500), "OK"));
    obs.start().unwrap();
    assert!(obs.record_rpc_latency("pkg.Svc/Get", "dns:///svc", Duration::from_millis(1500), "OK"));
    obs.stop().await.unwrap();

    let updates = calls.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, MetricValue::Double(1.5));
    assert_eq!(updates[0].1.get(STATUS_LABEL).map(String::as_str), Some("OK"));
}

#[test]
fn aggregated_labels_follow_plugin_order() {
    let first = Plugin::builder()
        .enable_metrics(std::iter::empty())
        .option(PrefixOption::new(
            "xds:",
            StaticInjector::new(LabelBundle::new().with("k", "first"), "p"),
        ))
        .enable_optional_label(OptionalLabel::XdsServiceLabels)
        .build();
    let second = Plugin::builder()
        .enable_metrics(std::iter::empty())
        .option(PrefixOption::new(
            "xds:",
            StaticInjector::new(LabelBundle::new().with("k", "second"), "p"),
        ))
        .build();
    let ids = format!("{},{}", first.identifier(), second.identifier());

    let obs = Observability::builder().plugin(first).plugin(second).build();

    assert_eq!(obs.identifier(), ids);
    assert_eq!(obs.client_exchange_labels("xds:///svc").get_str("k"), Some("second"));
    assert_eq!(obs.server_exchange_labels(false).get_str("k"), Some("second"));
    assert!(obs.client_exchange_labels("dns:///svc").is_empty());
    assert!(obs.enabled_optional_labels().contains(&OptionalLabel::XdsServiceLabels));
    assert!(obs.is_server_traced(false));
}
