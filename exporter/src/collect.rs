//! Collection pipeline
//!
//! A scrape issues its cluster queries strictly one after another: health,
//! local node info and node stats always, then indices stats and cluster
//! state when the settings snapshot enables them. Exactly one query is in
//! flight at a time. The first failing stage aborts the pipeline and no
//! partial snapshot is ever returned.

use crate::client::{
    ClientError, ClusterClient, ClusterStateRequest, HealthLevel, HealthRequest,
    IndicesStatsRequest, NodesInfoRequest, NodesStatsRequest,
};
use crate::disk::ClusterStatsData;
use crate::metrics::STAGE_FAILURES;
use crate::settings::SettingsSnapshot;
use osprom_shared::{ClusterHealth, IndicesStats, LocalNodeInfo, NodeStats};
use std::fmt;
use std::future::Future;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, debug_span, warn, Instrument};

/// Position of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Health,
    NodeInfo,
    NodeStats,
    IndicesStats,
    ClusterState,
    Done,
}

impl Stage {
    pub const FIRST: Stage = Stage::Health;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::NodeInfo => "node_info",
            Self::NodeStats => "nodes_stats",
            Self::IndicesStats => "indices_stats",
            Self::ClusterState => "cluster_state",
            Self::Done => "done",
        }
    }

    /// Next stage to run once `self` completed. Disabled optional stages are
    /// skipped.
    pub fn after(self, settings: &SettingsSnapshot) -> Stage {
        match self {
            Self::Health => Self::NodeInfo,
            Self::NodeInfo => Self::NodeStats,
            Self::NodeStats if settings.indices_enabled() => Self::IndicesStats,
            Self::NodeStats | Self::IndicesStats if settings.cluster_settings_enabled() => {
                Self::ClusterState
            }
            Self::NodeStats | Self::IndicesStats | Self::ClusterState | Self::Done => Self::Done,
        }
    }

    /// Stages a pipeline run under `settings` issues, in order.
    pub fn plan(settings: &SettingsSnapshot) -> Vec<Stage> {
        let mut stages = Vec::new();
        let mut stage = Self::FIRST;
        while stage != Self::Done {
            stages.push(stage);
            stage = stage.after(settings);
        }
        stages
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("{message}")]
    Stage {
        stage: Stage,
        message: &'static str,
        #[source]
        source: ClientError,
    },
}

impl CollectError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Stage { stage, .. } => *stage,
        }
    }
}

/// Everything one pipeline run gathered. Optional parts are `None` when
/// their stage was disabled.
#[derive(Debug, Clone)]
pub struct CollectionSnapshot {
    pub health: ClusterHealth,
    pub local_node: LocalNodeInfo,
    pub node_stats: Vec<NodeStats>,
    pub indices_stats: Option<IndicesStats>,
    pub cluster_settings: Option<ClusterStatsData>,
}

/// Driver state. Each variant holds what the stages before it gathered.
enum Progress {
    Health,
    NodeInfo {
        health: ClusterHealth,
    },
    NodeStats {
        health: ClusterHealth,
        local_node: LocalNodeInfo,
    },
    IndicesStats(CollectionSnapshot),
    ClusterState(CollectionSnapshot),
    Done(CollectionSnapshot),
}

impl Progress {
    /// State following `completed` once the mandatory stages are in.
    fn resume(completed: Stage, snapshot: CollectionSnapshot, settings: &SettingsSnapshot) -> Self {
        match completed.after(settings) {
            Stage::IndicesStats => Self::IndicesStats(snapshot),
            Stage::ClusterState => Self::ClusterState(snapshot),
            _ => Self::Done(snapshot),
        }
    }
}

/// Drives the stages of one collection against a [`ClusterClient`].
pub struct Orchestrator<'a, C: ?Sized> {
    client: &'a C,
}

impl<'a, C: ClusterClient + ?Sized> Orchestrator<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    pub async fn collect(&self, settings: &SettingsSnapshot) -> Result<CollectionSnapshot, CollectError> {
        let mut progress = Progress::Health;
        loop {
            progress = match progress {
                Progress::Done(snapshot) => return Ok(snapshot),
                Progress::Health => {
                    let request = HealthRequest {
                        local: true,
                        level: HealthLevel::Shards,
                    };
                    let health = self
                        .run(
                            Stage::Health,
                            "cluster health request failed",
                            self.client.cluster_health(&request),
                        )
                        .await?;
                    Progress::NodeInfo { health }
                }
                Progress::NodeInfo { health } => {
                    let request = NodesInfoRequest {
                        selector: "_local".to_string(),
                        minimal: true,
                    };
                    let local_node = self
                        .run(
                            Stage::NodeInfo,
                            "nodes info request failed for local node",
                            self.client.nodes_info(&request),
                        )
                        .await?;
                    Progress::NodeStats { health, local_node }
                }
                Progress::NodeStats { health, local_node } => {
                    let request = NodesStatsRequest {
                        selector: settings.nodes_filter().to_string(),
                        all: true,
                    };
                    let node_stats = self
                        .run(
                            Stage::NodeStats,
                            "nodes stats request failed",
                            self.client.nodes_stats(&request),
                        )
                        .await?;
                    let snapshot = CollectionSnapshot {
                        health,
                        local_node,
                        node_stats,
                        indices_stats: None,
                        cluster_settings: None,
                    };
                    Progress::resume(Stage::NodeStats, snapshot, settings)
                }
                Progress::IndicesStats(mut snapshot) => {
                    let request = IndicesStatsRequest {
                        indices: settings.selected_indices(),
                        options: settings.indices_options(),
                    };
                    let stats = self
                        .run(
                            Stage::IndicesStats,
                            "indices stats request failed",
                            self.client.indices_stats(&request),
                        )
                        .await?;
                    snapshot.indices_stats = Some(stats);
                    Progress::resume(Stage::IndicesStats, snapshot, settings)
                }
                Progress::ClusterState(mut snapshot) => {
                    let request = ClusterStateRequest {
                        metadata_only: true,
                        local: false,
                    };
                    let layers = self
                        .run(
                            Stage::ClusterState,
                            "cluster state request failed",
                            self.client.cluster_state(&request),
                        )
                        .await?;
                    snapshot.cluster_settings = Some(ClusterStatsData::from_layers(&layers));
                    Progress::resume(Stage::ClusterState, snapshot, settings)
                }
            };
        }
    }

    /// Await one stage's query inside its span; a failure is counted and
    /// logged before it is returned.
    async fn run<T, F>(&self, stage: Stage, message: &'static str, query: F) -> Result<T, CollectError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        let started = Instant::now();
        let span = debug_span!("collect_stage", stage = stage.as_str());
        match query.instrument(span).await {
            Ok(value) => {
                debug!(
                    stage = stage.as_str(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "stage completed"
                );
                Ok(value)
            }
            Err(source) => {
                STAGE_FAILURES.with_label_values(&[stage.as_str()]).inc();
                warn!(stage = stage.as_str(), error = %source, "{}", message);
                Err(CollectError::Stage { stage, message, source })
            }
        }
    }
}
