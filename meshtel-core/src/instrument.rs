use std::collections::HashMap;
use std::sync::Arc;

use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider};
use opentelemetry::KeyValue;

use crate::metrics::{InstrumentKind, MetricName};
use crate::record::MetricValue;

/// Name of the meter instruments are registered under.
pub const METER_NAME: &str = "meshtel";

/// A pre-registered counter or histogram.
///
/// The OpenTelemetry-backed implementation is [`OtelInstrument`]; tests swap
/// in a recording double.
pub trait Instrument: Send + Sync {
    fn kind(&self) -> InstrumentKind;

    /// Apply one measurement: counters add, histograms record.
    fn update(&self, value: MetricValue, attributes: &[KeyValue]);
}

pub enum OtelInstrument {
    Counter(Counter<u64>),
    Histogram(Histogram<f64>),
}

impl OtelInstrument {
    /// Register the instrument for `name` on `meter`, using the catalog's
    /// unit and description.
    pub fn register(meter: &Meter, name: MetricName) -> Self {
        match name.kind() {
            InstrumentKind::Counter => OtelInstrument::Counter(
                meter
                    .u64_counter(name.as_str())
                    .with_unit(name.unit())
                    .with_description(name.description())
                    .build(),
            ),
            InstrumentKind::Histogram => OtelInstrument::Histogram(
                meter
                    .f64_histogram(name.as_str())
                    .with_unit(name.unit())
                    .with_description(name.description())
                    .build(),
            ),
        }
    }
}

impl Instrument for OtelInstrument {
    fn kind(&self) -> InstrumentKind {
        match self {
            OtelInstrument::Counter(_) => InstrumentKind::Counter,
            OtelInstrument::Histogram(_) => InstrumentKind::Histogram,
        }
    }

    fn update(&self, value: MetricValue, attributes: &[KeyValue]) {
        match self {
            OtelInstrument::Counter(c) => c.add(value.as_u64(), attributes),
            OtelInstrument::Histogram(h) => h.record(value.as_f64(), attributes),
        }
    }
}

/// Instruments keyed by metric, as held by a recorder.
pub type InstrumentTable = HashMap<MetricName, Arc<dyn Instrument>>;

/// Create one instrument per metric in `metrics` on a `meshtel` meter of
/// `provider`.
pub fn register_instruments<P>(provider: &P, metrics: &[MetricName]) -> InstrumentTable
where
    P: MeterProvider + ?Sized,
{
    let meter = provider.meter(METER_NAME);
    metrics
        .iter()
        .map(|name| {
            let instrument: Arc<dyn Instrument> = Arc::new(OtelInstrument::register(&meter, *name));
            (*name, instrument)
        })
        .collect()
}
