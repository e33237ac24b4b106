//! Dynamic exporter settings
//!
//! The options that steer a scrape (which optional stages run, which nodes
//! and indices are queried) live in a process-wide [`SettingsStore`] that an
//! administrator can update at runtime. A scrape never reads the store
//! directly: it takes a [`SettingsSnapshot`] by value when it starts, so a
//! concurrent update cannot change its choices half-way through.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

pub const CLUSTER_SETTINGS_KEY: &str = "prometheus.cluster.settings";
pub const INDICES_KEY: &str = "prometheus.indices";
pub const NODES_FILTER_KEY: &str = "prometheus.nodes.filter";
pub const SELECTED_INDICES_KEY: &str = "prometheus.indices_filter.selected_indices";
pub const SELECTED_OPTION_KEY: &str = "prometheus.indices_filter.selected_option";

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("unknown setting [{0}]")]
    UnknownKey(String),

    #[error("invalid value [{value}] for setting [{key}]")]
    InvalidValue { key: String, value: String },

    #[error("unknown index filter option [{0}]")]
    UnknownIndexFilterOption(String),
}

/// How the index selection is expanded and which indices it may touch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexFilterOption {
    StrictExpandOpen,
    StrictExpandOpenHidden,
    #[default]
    StrictExpandOpenForbidClosed,
    StrictExpandOpenHiddenForbidClosed,
    StrictExpandOpenForbidClosedIgnoreThrottled,
    StrictExpandOpenClosed,
    StrictExpandOpenClosedHidden,
    StrictSingleIndexNoExpandForbidClosed,
    LenientExpandOpen,
    LenientExpandOpenHidden,
    LenientExpandOpenClosed,
    LenientExpandOpenClosedHidden,
}

impl IndexFilterOption {
    pub const ALL: [IndexFilterOption; 12] = [
        Self::StrictExpandOpen,
        Self::StrictExpandOpenHidden,
        Self::StrictExpandOpenForbidClosed,
        Self::StrictExpandOpenHiddenForbidClosed,
        Self::StrictExpandOpenForbidClosedIgnoreThrottled,
        Self::StrictExpandOpenClosed,
        Self::StrictExpandOpenClosedHidden,
        Self::StrictSingleIndexNoExpandForbidClosed,
        Self::LenientExpandOpen,
        Self::LenientExpandOpenHidden,
        Self::LenientExpandOpenClosed,
        Self::LenientExpandOpenClosedHidden,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrictExpandOpen => "STRICT_EXPAND_OPEN",
            Self::StrictExpandOpenHidden => "STRICT_EXPAND_OPEN_HIDDEN",
            Self::StrictExpandOpenForbidClosed => "STRICT_EXPAND_OPEN_FORBID_CLOSED",
            Self::StrictExpandOpenHiddenForbidClosed => "STRICT_EXPAND_OPEN_HIDDEN_FORBID_CLOSED",
            Self::StrictExpandOpenForbidClosedIgnoreThrottled => {
                "STRICT_EXPAND_OPEN_FORBID_CLOSED_IGNORE_THROTTLED"
            }
            Self::StrictExpandOpenClosed => "STRICT_EXPAND_OPEN_CLOSED",
            Self::StrictExpandOpenClosedHidden => "STRICT_EXPAND_OPEN_CLOSED_HIDDEN",
            Self::StrictSingleIndexNoExpandForbidClosed => "STRICT_SINGLE_INDEX_NO_EXPAND_FORBID_CLOSED",
            Self::LenientExpandOpen => "LENIENT_EXPAND_OPEN",
            Self::LenientExpandOpenHidden => "LENIENT_EXPAND_OPEN_HIDDEN",
            Self::LenientExpandOpenClosed => "LENIENT_EXPAND_OPEN_CLOSED",
            Self::LenientExpandOpenClosedHidden => "LENIENT_EXPAND_OPEN_CLOSED_HIDDEN",
        }
    }

    /// The concrete visibility flags this option stands for.
    pub fn indices_options(&self) -> IndicesOptions {
        let strict = IndicesOptions {
            ignore_unavailable: false,
            allow_no_indices: true,
            expand_open: true,
            expand_closed: false,
            expand_hidden: false,
            forbid_closed: false,
            ignore_throttled: false,
        };
        let lenient = IndicesOptions {
            ignore_unavailable: true,
            ..strict
        };
        match self {
            Self::StrictExpandOpen => strict,
            Self::StrictExpandOpenHidden => IndicesOptions {
                expand_hidden: true,
                ..strict
            },
            Self::StrictExpandOpenForbidClosed => IndicesOptions {
                forbid_closed: true,
                ..strict
            },
            Self::StrictExpandOpenHiddenForbidClosed => IndicesOptions {
                expand_hidden: true,
                forbid_closed: true,
                ..strict
            },
            Self::StrictExpandOpenForbidClosedIgnoreThrottled => IndicesOptions {
                forbid_closed: true,
                ignore_throttled: true,
                ..strict
            },
            Self::StrictExpandOpenClosed => IndicesOptions {
                expand_closed: true,
                ..strict
            },
            Self::StrictExpandOpenClosedHidden => IndicesOptions {
                expand_closed: true,
                expand_hidden: true,
                ..strict
            },
            Self::StrictSingleIndexNoExpandForbidClosed => IndicesOptions {
                allow_no_indices: false,
                expand_open: false,
                forbid_closed: true,
                ..strict
            },
            Self::LenientExpandOpen => lenient,
            Self::LenientExpandOpenHidden => IndicesOptions {
                expand_hidden: true,
                ..lenient
            },
            Self::LenientExpandOpenClosed => IndicesOptions {
                expand_closed: true,
                ..lenient
            },
            Self::LenientExpandOpenClosedHidden => IndicesOptions {
                expand_closed: true,
                expand_hidden: true,
                ..lenient
            },
        }
    }
}

impl FromStr for IndexFilterOption {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|option| option.as_str() == s)
            .ok_or_else(|| SettingsError::UnknownIndexFilterOption(s.to_string()))
    }
}

/// Wildcard expansion and availability rules for an indices request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicesOptions {
    pub ignore_unavailable: bool,
    pub allow_no_indices: bool,
    pub expand_open: bool,
    pub expand_closed: bool,
    pub expand_hidden: bool,
    pub forbid_closed: bool,
    pub ignore_throttled: bool,
}

impl IndicesOptions {
    /// Value of the `expand_wildcards` request parameter.
    pub fn expand_wildcards(&self) -> String {
        let mut states = Vec::new();
        if self.expand_open {
            states.push("open");
        }
        if self.expand_closed {
            states.push("closed");
        }
        if self.expand_hidden {
            states.push("hidden");
        }
        if states.is_empty() {
            "none".to_string()
        } else {
            states.join(",")
        }
    }

    /// Request parameters carrying these options. `forbid_closed` has no
    /// parameter of its own: closed indices are kept out by leaving `closed`
    /// out of `expand_wildcards`.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("expand_wildcards", self.expand_wildcards()),
            ("ignore_unavailable", self.ignore_unavailable.to_string()),
            ("allow_no_indices", self.allow_no_indices.to_string()),
            ("ignore_throttled", self.ignore_throttled.to_string()),
        ]
    }

    /// [`IndicesOptions::query_params`] joined as `k=v&k=v`.
    pub fn query_string(&self) -> String {
        self.query_params()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Current values of the dynamic settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterSettings {
    /// Expose cluster-settings-derived metrics
    pub cluster_settings: bool,

    /// Expose index-level metrics
    pub indices: bool,

    /// Which nodes to gather node stats from
    pub nodes_filter: String,

    /// Comma-separated index selection; empty selects every index
    pub selected_indices: String,

    pub selected_option: IndexFilterOption,
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            cluster_settings: true,
            indices: true,
            nodes_filter: "_local".to_string(),
            selected_indices: String::new(),
            selected_option: IndexFilterOption::default(),
        }
    }
}

impl ExporterSettings {
    /// Settings keyed by their dotted setting names.
    pub fn to_map(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            (CLUSTER_SETTINGS_KEY, self.cluster_settings.to_string()),
            (INDICES_KEY, self.indices.to_string()),
            (NODES_FILTER_KEY, self.nodes_filter.clone()),
            (SELECTED_INDICES_KEY, self.selected_indices.clone()),
            (SELECTED_OPTION_KEY, self.selected_option.as_str().to_string()),
        ])
    }
}

/// A partial update; `None` fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub cluster_settings: Option<bool>,
    pub indices: Option<bool>,
    pub nodes_filter: Option<String>,
    pub selected_indices: Option<String>,
    pub selected_option: Option<IndexFilterOption>,
}

impl SettingsUpdate {
    /// Parse `{ "<dotted key>": <value>, ... }`.
    ///
    /// Every key is validated before anything is returned, so an invalid
    /// document yields no update at all.
    pub fn from_json(doc: &serde_json::Map<String, serde_json::Value>) -> Result<Self, SettingsError> {
        let mut update = Self::default();
        for (key, value) in doc {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Bool(b) => b.to_string(),
                other => other.to_string(),
            };
            let invalid = || SettingsError::InvalidValue {
                key: key.clone(),
                value: text.clone(),
            };
            match key.as_str() {
                CLUSTER_SETTINGS_KEY => {
                    update.cluster_settings = Some(text.parse().map_err(|_| invalid())?)
                }
                INDICES_KEY => update.indices = Some(text.parse().map_err(|_| invalid())?),
                NODES_FILTER_KEY => {
                    if text.trim().is_empty() {
                        return Err(invalid());
                    }
                    update.nodes_filter = Some(text)
                }
                SELECTED_INDICES_KEY => update.selected_indices = Some(text),
                SELECTED_OPTION_KEY => update.selected_option = Some(text.parse()?),
                _ => return Err(SettingsError::UnknownKey(key.clone())),
            }
        }
        Ok(update)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply(self, settings: &mut ExporterSettings) {
        if let Some(v) = self.cluster_settings {
            settings.cluster_settings = v;
        }
        if let Some(v) = self.indices {
            settings.indices = v;
        }
        if let Some(v) = self.nodes_filter {
            settings.nodes_filter = v;
        }
        if let Some(v) = self.selected_indices {
            settings.selected_indices = v;
        }
        if let Some(v) = self.selected_option {
            settings.selected_option = v;
        }
    }
}

/// Immutable copy of the settings taken at the start of a scrape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsSnapshot {
    settings: ExporterSettings,
}

impl SettingsSnapshot {
    pub fn new(settings: ExporterSettings) -> Self {
        Self { settings }
    }

    pub fn cluster_settings_enabled(&self) -> bool {
        self.settings.cluster_settings
    }

    pub fn indices_enabled(&self) -> bool {
        self.settings.indices
    }

    pub fn nodes_filter(&self) -> &str {
        &self.settings.nodes_filter
    }

    /// The index selection split on commas; blank entries are dropped.
    pub fn selected_indices(&self) -> Vec<String> {
        self.settings
            .selected_indices
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn indices_options(&self) -> IndicesOptions {
        self.settings.selected_option.indices_options()
    }

    pub fn settings(&self) -> &ExporterSettings {
        &self.settings
    }
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self::new(ExporterSettings::default())
    }
}

type UpdateHandler = Box<dyn Fn(&ExporterSettings) + Send + Sync>;

/// Process-wide settings with change notification. Thread-safe.
pub struct SettingsStore {
    current: RwLock<ExporterSettings>,
    handlers: RwLock<Vec<UpdateHandler>>,
}

impl SettingsStore {
    pub fn new(initial: ExporterSettings) -> Self {
        Self {
            current: RwLock::new(initial),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> SettingsSnapshot {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        SettingsSnapshot::new(current.clone())
    }

    /// Register a handler called with the new values after every update.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&ExporterSettings) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    /// Apply a partial update, notify subscribers and return the new values.
    pub fn update(&self, update: SettingsUpdate) -> ExporterSettings {
        let updated = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            update.apply(&mut current);
            current.clone()
        };
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        for handler in handlers.iter() {
            handler(&updated);
        }
        updated
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(ExporterSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn doc(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_defaults() {
        let snapshot = SettingsStore::default().snapshot();
        assert!(snapshot.cluster_settings_enabled());
        assert!(snapshot.indices_enabled());
        assert_eq!(snapshot.nodes_filter(), "_local");
        assert!(snapshot.selected_indices().is_empty());
        assert_eq!(
            snapshot.settings().selected_option,
            IndexFilterOption::StrictExpandOpenForbidClosed
        );
    }

    #[test]
    fn test_snapshot_is_isolated_from_updates() {
        let store = SettingsStore::default();
        let before = store.snapshot();
        store.update(SettingsUpdate {
            indices: Some(false),
            ..Default::default()
        });
        assert!(before.indices_enabled());
        assert!(!store.snapshot().indices_enabled());
    }

    #[test]
    fn test_subscribers_notified() {
        let store = SettingsStore::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        store.subscribe(move |settings| {
            assert_eq!(settings.nodes_filter, "_all");
            seen.fetch_add(1, Ordering::SeqCst);
        });
        store.update(SettingsUpdate {
            nodes_filter: Some("_all".into()),
            ..Default::default()
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_update_from_json() {
        let update = SettingsUpdate::from_json(&doc(json!({
            "prometheus.indices": false,
            "prometheus.cluster.settings": "false",
            "prometheus.indices_filter.selected_indices": "logs-*, metrics ,",
            "prometheus.indices_filter.selected_option": "LENIENT_EXPAND_OPEN_HIDDEN"
        })))
        .unwrap();
        let store = SettingsStore::default();
        store.update(update);
        let snapshot = store.snapshot();
        assert!(!snapshot.indices_enabled());
        assert!(!snapshot.cluster_settings_enabled());
        assert_eq!(snapshot.selected_indices(), vec!["logs-*", "metrics"]);
        assert!(snapshot.indices_options().ignore_unavailable);
        assert!(snapshot.indices_options().expand_hidden);
    }

    #[test]
    fn test_update_from_json_rejects_bad_input() {
        assert_eq!(
            SettingsUpdate::from_json(&doc(json!({ "prometheus.bogus": 1 }))),
            Err(SettingsError::UnknownKey("prometheus.bogus".into()))
        );
        assert!(matches!(
            SettingsUpdate::from_json(&doc(json!({ "prometheus.indices": "maybe" }))),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            SettingsUpdate::from_json(&doc(json!({ "prometheus.indices_filter.selected_option": "NOPE" }))),
            Err(SettingsError::UnknownIndexFilterOption(_))
        ));
        assert!(SettingsUpdate::from_json(&doc(json!({}))).unwrap().is_empty());
    }

    #[test]
    fn test_index_filter_options() {
        for option in IndexFilterOption::ALL {
            assert_eq!(option.as_str().parse::<IndexFilterOption>().unwrap(), option);
        }
        let forbid_closed = IndexFilterOption::StrictExpandOpenForbidClosed.indices_options();
        assert_eq!(forbid_closed.expand_wildcards(), "open");
        assert!(forbid_closed.forbid_closed);
        assert!(!forbid_closed.ignore_unavailable);

        let all = IndexFilterOption::LenientExpandOpenClosedHidden.indices_options();
        assert_eq!(all.expand_wildcards(), "open,closed,hidden");

        let single = IndexFilterOption::StrictSingleIndexNoExpandForbidClosed.indices_options();
        assert_eq!(single.expand_wildcards(), "none");
        assert!(!single.allow_no_indices);
    }

    #[test]
    fn test_query_string_per_option() {
        let strict = "ignore_unavailable=false&allow_no_indices=true&ignore_throttled=false";
        let lenient = "ignore_unavailable=true&allow_no_indices=true&ignore_throttled=false";
        let expected = [
            (IndexFilterOption::StrictExpandOpen, format!("expand_wildcards=open&{}", strict)),
            (IndexFilterOption::StrictExpandOpenHidden, format!("expand_wildcards=open,hidden&{}", strict)),
            (IndexFilterOption::StrictExpandOpenForbidClosed, format!("expand_wildcards=open&{}", strict)),
            (
                IndexFilterOption::StrictExpandOpenHiddenForbidClosed,
                format!("expand_wildcards=open,hidden&{}", strict),
            ),
            (
                IndexFilterOption::StrictExpandOpenForbidClosedIgnoreThrottled,
                "expand_wildcards=open&ignore_unavailable=false&allow_no_indices=true&ignore_throttled=true".to_string(),
            ),
            (IndexFilterOption::StrictExpandOpenClosed, format!("expand_wildcards=open,closed&{}", strict)),
            (
                IndexFilterOption::StrictExpandOpenClosedHidden,
                format!("expand_wildcards=open,closed,hidden&{}", strict),
            ),
            (
                IndexFilterOption::StrictSingleIndexNoExpandForbidClosed,
                "expand_wildcards=none&ignore_unavailable=false&allow_no_indices=false&ignore_throttled=false".to_string(),
            ),
            (IndexFilterOption::LenientExpandOpen, format!("expand_wildcards=open&{}", lenient)),
            (IndexFilterOption::LenientExpandOpenHidden, format!("expand_wildcards=open,hidden&{}", lenient)),
            (IndexFilterOption::LenientExpandOpenClosed, format!("expand_wildcards=open,closed&{}", lenient)),
            (
                IndexFilterOption::LenientExpandOpenClosedHidden,
                format!("expand_wildcards=open,closed,hidden&{}", lenient),
            ),
        ];
        assert_eq!(expected.len(), IndexFilterOption::ALL.len());
        for (option, query) in expected {
            assert_eq!(option.indices_options().query_string(), query, "{}", option.as_str());
        }
    }

    #[test]
    fn test_only_recognized_parameters_are_sent() {
        let recognized = ["expand_wildcards", "ignore_unavailable", "allow_no_indices", "ignore_throttled"];
        for option in IndexFilterOption::ALL {
            for (name, _) in option.indices_options().query_params() {
                assert!(recognized.contains(&name), "{} sends {}", option.as_str(), name);
            }
        }
    }
}
