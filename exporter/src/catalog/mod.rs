//! Metrics catalog
//!
//! A catalog owns a private Prometheus registry and a name -> metric map.
//! Metrics are registered once (under `prefix + name`) and then set any
//! number of times; label sets are automatically extended with the cluster
//! or node context depending on the call family used. One catalog is built
//! per scrape and thrown away after rendering.
//!
//! ```ignore
//! let mut catalog = Catalog::new("prod", "opensearch_")?;
//! catalog.register_node_counter("threadpool_threads_count", "Count of threads in thread pool", &["name", "type"])?;
//! catalog.set_node_counter(&node, "threadpool_threads_count", 42.0, &["search", "completed"])?;
//! let text = catalog.render_text()?;
//! ```

pub mod family;
pub mod labels;

pub use family::{CounterFamily, GaugeFamily, SummaryFamily, SummaryTimer};
pub use labels::NodeContext;

use labels::{cluster_label_values, extend_cluster_labels, extend_node_labels, node_label_values};
use prometheus::{Encoder, Registry, TextEncoder};
use std::collections::HashMap;
use std::fmt;
use std::string::FromUtf8Error;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("metric prefix [{0}] is not valid")]
    InvalidPrefix(String),

    #[error("metric [{0}] is already registered")]
    DuplicateMetric(String),

    #[error("unknown metric [{0}]")]
    UnknownMetric(String),

    #[error("metric [{metric}] is a {actual}, not a {expected}")]
    KindMismatch {
        metric: String,
        expected: MetricKind,
        actual: MetricKind,
    },

    #[error("metric [{metric}] is {registered}-scoped")]
    ScopeMismatch { metric: String, registered: Scope },

    #[error("label cardinality mismatch for metric [{metric}]: expected {expected} values, got {got}")]
    LabelCardinality {
        metric: String,
        expected: usize,
        got: usize,
    },

    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),

    #[error("rendered metrics are not valid UTF-8: {0}")]
    Encoding(#[from] FromUtf8Error),
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

/// Which context labels a metric carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Cluster,
    Node,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cluster => f.write_str("cluster"),
            Self::Node => f.write_str("node"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
    Summary,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gauge => f.write_str("gauge"),
            Self::Counter => f.write_str("counter"),
            Self::Summary => f.write_str("summary"),
        }
    }
}

/// A registered metric family
#[derive(Clone)]
pub enum Metric {
    Gauge(GaugeFamily),
    Counter(CounterFamily),
    Summary(SummaryFamily),
}

impl Metric {
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Counter(_) => MetricKind::Counter,
            Self::Summary(_) => MetricKind::Summary,
        }
    }
}

struct Entry {
    scope: Scope,
    metric: Metric,
}

/// Check that `prefix` is non-empty and can start a metric name.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    let mut chars = prefix.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_' || first == ':')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(CatalogError::InvalidPrefix(prefix.to_string()))
    }
}

pub struct Catalog {
    cluster_name: String,
    prefix: String,
    registry: Registry,
    metrics: HashMap<String, Entry>,
}

impl Catalog {
    /// Create an empty catalog for `cluster_name`; every metric name is
    /// prefixed with `prefix`.
    pub fn new(cluster_name: impl Into<String>, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self {
            cluster_name: cluster_name.into(),
            prefix,
            registry: Registry::new(),
            metrics: HashMap::new(),
        })
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn contains(&self, metric: &str) -> bool {
        self.metrics.contains_key(metric)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    // ── Registration ─────────────────────────────────────────────────────────

    pub fn register_cluster_gauge(&mut self, metric: &str, help: &str, labels: &[&str]) -> Result<()> {
        self.register(metric, help, Scope::Cluster, labels, MetricKind::Gauge)
    }

    pub fn register_node_gauge(&mut self, metric: &str, help: &str, labels: &[&str]) -> Result<()> {
        self.register(metric, help, Scope::Node, labels, MetricKind::Gauge)
    }

    pub fn register_cluster_counter(&mut self, metric: &str, help: &str, labels: &[&str]) -> Result<()> {
        self.register(metric, help, Scope::Cluster, labels, MetricKind::Counter)
    }

    pub fn register_node_counter(&mut self, metric: &str, help: &str, labels: &[&str]) -> Result<()> {
        self.register(metric, help, Scope::Node, labels, MetricKind::Counter)
    }

    /// Summaries are always node-scoped.
    pub fn register_summary_timer(&mut self, metric: &str, help: &str, labels: &[&str]) -> Result<()> {
        self.register(metric, help, Scope::Node, labels, MetricKind::Summary)
    }

    fn register(
        &mut self,
        metric: &str,
        help: &str,
        scope: Scope,
        labels: &[&str],
        kind: MetricKind,
    ) -> Result<()> {
        if self.metrics.contains_key(metric) {
            return Err(CatalogError::DuplicateMetric(metric.to_string()));
        }

        let name = format!("{}{}", self.prefix, metric);
        let label_names = match scope {
            Scope::Cluster => extend_cluster_labels(labels),
            Scope::Node => extend_node_labels(labels),
        };

        let family = match kind {
            MetricKind::Gauge => {
                let f = GaugeFamily::new(&name, help, label_names)?;
                self.registry.register(Box::new(f.clone()))?;
                Metric::Gauge(f)
            }
            MetricKind::Counter => {
                let f = CounterFamily::new(&name, help, label_names)?;
                self.registry.register(Box::new(f.clone()))?;
                Metric::Counter(f)
            }
            MetricKind::Summary => {
                let f = SummaryFamily::new(&name, help, label_names)?;
                self.registry.register(Box::new(f.clone()))?;
                Metric::Summary(f)
            }
        };

        self.metrics.insert(
            metric.to_string(),
            Entry {
                scope,
                metric: family,
            },
        );
        debug!("Registered new {} {} {}", scope, kind, metric);
        Ok(())
    }

    // ── Setters ──────────────────────────────────────────────────────────────

    pub fn set_cluster_gauge(&self, metric: &str, value: f64, labels: &[&str]) -> Result<()> {
        let values = cluster_label_values(&self.cluster_name, labels);
        let family = self.gauge(metric, Scope::Cluster, values.len())?;
        family.with_sample(&values, |s| s.value = value)?;
        Ok(())
    }

    pub fn set_node_gauge(&self, node: &NodeContext, metric: &str, value: f64, labels: &[&str]) -> Result<()> {
        let values = node_label_values(&self.cluster_name, node, labels);
        let family = self.gauge(metric, Scope::Node, values.len())?;
        family.with_sample(&values, |s| s.value = value)?;
        Ok(())
    }

    /// Move a cluster counter forward to `value`.
    ///
    /// A value lower than the current one is not applied; the regression is
    /// logged and the exposed value stays as it was.
    pub fn set_cluster_counter(&self, metric: &str, value: f64, labels: &[&str]) -> Result<()> {
        let values = cluster_label_values(&self.cluster_name, labels);
        self.advance_counter(metric, Scope::Cluster, value, values)
    }

    /// Node-scoped twin of [`Catalog::set_cluster_counter`].
    pub fn set_node_counter(&self, node: &NodeContext, metric: &str, value: f64, labels: &[&str]) -> Result<()> {
        let values = node_label_values(&self.cluster_name, node, labels);
        self.advance_counter(metric, Scope::Node, value, values)
    }

    fn advance_counter(&self, metric: &str, scope: Scope, value: f64, values: Vec<String>) -> Result<()> {
        let family = self.counter(metric, scope, values.len())?;
        let rejected = family.with_sample(&values, |s| {
            let increment = value - s.value;
            if increment >= 0.0 {
                s.value += increment;
                None
            } else {
                Some(s.value)
            }
        })?;
        if let Some(current) = rejected {
            warn!(
                metric = %metric,
                labels = ?values,
                current,
                value,
                "Counter went backwards, keeping current value"
            );
        }
        Ok(())
    }

    /// Start a timer that records into the node-scoped summary `metric`.
    pub fn start_summary_timer(&self, node: &NodeContext, metric: &str, labels: &[&str]) -> Result<SummaryTimer> {
        let values = node_label_values(&self.cluster_name, node, labels);
        let family = self.summary(metric, Scope::Node, values.len())?;
        Ok(SummaryTimer::start(family.clone(), values))
    }

    // ── Read-back ────────────────────────────────────────────────────────────

    /// Current value of a gauge series; `values` are the full label values,
    /// context labels included.
    pub fn gauge_value(&self, metric: &str, values: &[&str]) -> Result<Option<f64>> {
        let entry = self.entry(metric)?;
        match &entry.metric {
            Metric::Gauge(f) => Ok(f.get(&owned(values)).map(|s| s.value)),
            other => Err(kind_mismatch(metric, MetricKind::Gauge, other)),
        }
    }

    /// Current value of a counter series; see [`Catalog::gauge_value`].
    pub fn counter_value(&self, metric: &str, values: &[&str]) -> Result<Option<f64>> {
        let entry = self.entry(metric)?;
        match &entry.metric {
            Metric::Counter(f) => Ok(f.get(&owned(values)).map(|s| s.value)),
            other => Err(kind_mismatch(metric, MetricKind::Counter, other)),
        }
    }

    // ── Rendering ────────────────────────────────────────────────────────────

    /// Render every family with at least one series in the Prometheus text
    /// exposition format (v0.0.4).
    pub fn render_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    fn entry(&self, metric: &str) -> Result<&Entry> {
        self.metrics
            .get(metric)
            .ok_or_else(|| CatalogError::UnknownMetric(metric.to_string()))
    }

    fn checked(&self, metric: &str, scope: Scope, got: usize) -> Result<&Metric> {
        let entry = self.entry(metric)?;
        if entry.scope != scope {
            return Err(CatalogError::ScopeMismatch {
                metric: metric.to_string(),
                registered: entry.scope,
            });
        }
        let expected = match &entry.metric {
            Metric::Gauge(f) => f.label_names().len(),
            Metric::Counter(f) => f.label_names().len(),
            Metric::Summary(f) => f.label_names().len(),
        };
        if expected != got {
            return Err(CatalogError::LabelCardinality {
                metric: metric.to_string(),
                expected,
                got,
            });
        }
        Ok(&entry.metric)
    }

    fn gauge(&self, metric: &str, scope: Scope, got: usize) -> Result<&GaugeFamily> {
        match self.checked(metric, scope, got)? {
            Metric::Gauge(f) => Ok(f),
            other => Err(kind_mismatch(metric, MetricKind::Gauge, other)),
        }
    }

    fn counter(&self, metric: &str, scope: Scope, got: usize) -> Result<&CounterFamily> {
        match self.checked(metric, scope, got)? {
            Metric::Counter(f) => Ok(f),
            other => Err(kind_mismatch(metric, MetricKind::Counter, other)),
        }
    }

    fn summary(&self, metric: &str, scope: Scope, got: usize) -> Result<&SummaryFamily> {
        match self.checked(metric, scope, got)? {
            Metric::Summary(f) => Ok(f),
            other => Err(kind_mismatch(metric, MetricKind::Summary, other)),
        }
    }
}

fn kind_mismatch(metric: &str, expected: MetricKind, actual: &Metric) -> CatalogError {
    CatalogError::KindMismatch {
        metric: metric.to_string(),
        expected,
        actual: actual.kind(),
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
