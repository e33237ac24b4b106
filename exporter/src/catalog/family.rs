//! Metric families that keep their declared label order
//!
//! The stock `prometheus` vectors sort label pairs by name when a series is
//! created. The catalog wants series rendered with the context labels first
//! (`cluster`, `node`, `nodeid`, then the caller's labels), so each family
//! here is a small `Collector` that emits label pairs in declaration order and
//! leaves registration, gathering and encoding to the `prometheus` crate.

use prometheus::core::{Collector, Desc};
use prometheus::proto::{self, LabelPair, MetricFamily, MetricType};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::debug;

/// Per-series state of a family.
pub trait Sample: Default + Clone + Send + 'static {
    const METRIC_TYPE: MetricType;

    /// Write this sample's value into an outgoing metric.
    fn fill(&self, metric: &mut proto::Metric);
}

/// Last-write-wins value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GaugeSample {
    pub value: f64,
}

impl Sample for GaugeSample {
    const METRIC_TYPE: MetricType = MetricType::GAUGE;

    fn fill(&self, metric: &mut proto::Metric) {
        let mut gauge = proto::Gauge::default();
        gauge.set_value(self.value);
        metric.set_gauge(gauge);
    }
}

/// Monotonic value; only ever increased by the catalog
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CounterSample {
    pub value: f64,
}

impl Sample for CounterSample {
    const METRIC_TYPE: MetricType = MetricType::COUNTER;

    fn fill(&self, metric: &mut proto::Metric) {
        let mut counter = proto::Counter::default();
        counter.set_value(self.value);
        metric.set_counter(counter);
    }
}

/// Count and sum of observations (no quantiles)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SummarySample {
    pub count: u64,
    pub sum: f64,
}

impl SummarySample {
    pub fn observe(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
    }
}

impl Sample for SummarySample {
    const METRIC_TYPE: MetricType = MetricType::SUMMARY;

    fn fill(&self, metric: &mut proto::Metric) {
        let mut summary = proto::Summary::default();
        summary.set_sample_count(self.count);
        summary.set_sample_sum(self.sum);
        metric.set_summary(summary);
    }
}

struct Core<S> {
    desc: Desc,
    samples: Mutex<BTreeMap<Vec<String>, S>>,
}

/// A named metric family with a fixed list of label names.
///
/// Cloning is cheap and clones share the same series.
pub struct Family<S> {
    core: Arc<Core<S>>,
}

pub type GaugeFamily = Family<GaugeSample>;
pub type CounterFamily = Family<CounterSample>;
pub type SummaryFamily = Family<SummarySample>;

impl<S> Clone for Family<S> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<S: Sample> Family<S> {
    /// Validates the metric name, help text and label names.
    pub fn new(name: &str, help: &str, label_names: Vec<String>) -> prometheus::Result<Self> {
        let desc = Desc::new(name.to_string(), help.to_string(), label_names, HashMap::new())?;
        Ok(Self {
            core: Arc::new(Core {
                desc,
                samples: Mutex::new(BTreeMap::new()),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.core.desc.fq_name
    }

    pub fn label_names(&self) -> &[String] {
        &self.core.desc.variable_labels
    }

    /// Run `f` against the series for `values`, creating it on first use.
    pub fn with_sample<R>(&self, values: &[String], f: impl FnOnce(&mut S) -> R) -> prometheus::Result<R> {
        let expect = self.label_names().len();
        if values.len() != expect {
            return Err(prometheus::Error::InconsistentCardinality {
                expect,
                got: values.len(),
            });
        }
        let mut samples = self.lock();
        Ok(f(samples.entry(values.to_vec()).or_default()))
    }

    /// Current state of the series for `values`, if it was ever touched.
    pub fn get(&self, values: &[String]) -> Option<S> {
        self.lock().get(values).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<Vec<String>, S>> {
        self.core.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: Sample> Collector for Family<S> {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.core.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let samples = self.lock();
        let metrics: Vec<proto::Metric> = samples
            .iter()
            .map(|(values, sample)| {
                let labels: Vec<LabelPair> = self
                    .label_names()
                    .iter()
                    .zip(values)
                    .map(|(name, value)| {
                        let mut pair = LabelPair::default();
                        pair.set_name(name.clone());
                        pair.set_value(value.clone());
                        pair
                    })
                    .collect();
                let mut metric = proto::Metric::default();
                metric.set_label(labels.into());
                sample.fill(&mut metric);
                metric
            })
            .collect();

        let mut family = MetricFamily::default();
        family.set_name(self.core.desc.fq_name.clone());
        family.set_help(self.core.desc.help.clone());
        family.set_field_type(S::METRIC_TYPE);
        family.set_metric(metrics.into());
        vec![family]
    }
}

/// Records the time elapsed since it was started into a summary series.
///
/// The duration is recorded by `observe_duration`, or on drop if that was
/// never called.
#[must_use = "a timer records when it is dropped"]
pub struct SummaryTimer {
    family: SummaryFamily,
    values: Vec<String>,
    start: Instant,
    observed: bool,
}

impl SummaryTimer {
    pub(crate) fn start(family: SummaryFamily, values: Vec<String>) -> Self {
        Self {
            family,
            values,
            start: Instant::now(),
            observed: false,
        }
    }

    /// Stop the timer and record the elapsed seconds, which are returned.
    pub fn observe_duration(mut self) -> f64 {
        self.observe()
    }

    fn observe(&mut self) -> f64 {
        let elapsed = self.start.elapsed().as_secs_f64();
        self.observed = true;
        if let Err(e) = self.family.with_sample(&self.values, |s| s.observe(elapsed)) {
            debug!("Dropping timer observation for {}: {}", self.family.name(), e);
        }
        elapsed
    }
}

impl Drop for SummaryTimer {
    fn drop(&mut self) {
        if !self.observed {
            self.observe();
        }
    }
}
