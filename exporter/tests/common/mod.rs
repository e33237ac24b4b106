//! In-memory cluster used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use osprom_exporter::client::{
    ClientError, ClusterClient, ClusterStateRequest, HealthRequest, IndicesStatsRequest,
    NodesInfoRequest, NodesStatsRequest,
};
use osprom_shared::{
    ClusterHealth, ClusterSettingsLayers, HealthStatus, IndicesStats, LocalNodeInfo, NodeStats,
    ThreadPoolStats,
};
use std::sync::Mutex;
use std::time::Duration;

pub const HEALTH: &str = "cluster_health";
pub const NODES_INFO: &str = "nodes_info";
pub const NODES_STATS: &str = "nodes_stats";
pub const INDICES_STATS: &str = "indices_stats";
pub const CLUSTER_STATE: &str = "cluster_state";

pub struct MockCluster {
    pub health: ClusterHealth,
    pub local_node: LocalNodeInfo,
    pub node_stats: Vec<NodeStats>,
    pub indices_stats: IndicesStats,
    pub settings: ClusterSettingsLayers,
    fail_at: Option<&'static str>,
    delay: Option<Duration>,
    calls: Mutex<Vec<&'static str>>,
    health_requests: Mutex<Vec<HealthRequest>>,
    nodes_stats_requests: Mutex<Vec<NodesStatsRequest>>,
    indices_requests: Mutex<Vec<IndicesStatsRequest>>,
    state_requests: Mutex<Vec<ClusterStateRequest>>,
}

impl MockCluster {
    /// One green cluster `test-cluster` with node `node-1`/`id-1` whose
    /// search pool completed 42 tasks.
    pub fn new() -> Self {
        let mut node = NodeStats {
            id: "id-1".to_string(),
            name: "node-1".to_string(),
            roles: vec!["cluster_manager".to_string(), "data".to_string()],
            ..NodeStats::default()
        };
        node.thread_pool.insert(
            "search".to_string(),
            ThreadPoolStats {
                threads: 4,
                completed: 42,
                ..ThreadPoolStats::default()
            },
        );

        Self {
            health: ClusterHealth {
                cluster_name: "test-cluster".to_string(),
                status: HealthStatus::Green,
                number_of_nodes: 1,
                number_of_data_nodes: 1,
                active_shards_percent_as_number: 100.0,
                ..ClusterHealth::default()
            },
            local_node: LocalNodeInfo {
                cluster_name: "test-cluster".to_string(),
                node_name: "node-1".to_string(),
                node_id: "id-1".to_string(),
            },
            node_stats: vec![node],
            indices_stats: IndicesStats::default(),
            settings: ClusterSettingsLayers::default(),
            fail_at: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
            health_requests: Mutex::new(Vec::new()),
            nodes_stats_requests: Mutex::new(Vec::new()),
            indices_requests: Mutex::new(Vec::new()),
            state_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(mut self, call: &'static str) -> Self {
        self.fail_at = Some(call);
        self
    }

    /// Delay the health response.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn health_requests(&self) -> Vec<HealthRequest> {
        self.health_requests.lock().unwrap().clone()
    }

    pub fn nodes_stats_requests(&self) -> Vec<NodesStatsRequest> {
        self.nodes_stats_requests.lock().unwrap().clone()
    }

    pub fn indices_requests(&self) -> Vec<IndicesStatsRequest> {
        self.indices_requests.lock().unwrap().clone()
    }

    pub fn state_requests(&self) -> Vec<ClusterStateRequest> {
        self.state_requests.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) -> Result<(), ClientError> {
        self.calls.lock().unwrap().push(call);
        if self.fail_at == Some(call) {
            return Err(ClientError::Status {
                status: 503,
                body: format!("{} unavailable", call),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterClient for MockCluster {
    async fn cluster_health(&self, request: &HealthRequest) -> Result<ClusterHealth, ClientError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.health_requests.lock().unwrap().push(request.clone());
        self.record(HEALTH)?;
        Ok(self.health.clone())
    }

    async fn nodes_info(&self, _request: &NodesInfoRequest) -> Result<LocalNodeInfo, ClientError> {
        self.record(NODES_INFO)?;
        Ok(self.local_node.clone())
    }

    async fn nodes_stats(&self, request: &NodesStatsRequest) -> Result<Vec<NodeStats>, ClientError> {
        self.nodes_stats_requests.lock().unwrap().push(request.clone());
        self.record(NODES_STATS)?;
        Ok(self.node_stats.clone())
    }

    async fn indices_stats(&self, request: &IndicesStatsRequest) -> Result<IndicesStats, ClientError> {
        self.indices_requests.lock().unwrap().push(request.clone());
        self.record(INDICES_STATS)?;
        Ok(self.indices_stats.clone())
    }

    async fn cluster_state(&self, request: &ClusterStateRequest) -> Result<ClusterSettingsLayers, ClientError> {
        self.state_requests.lock().unwrap().push(request.clone());
        self.record(CLUSTER_STATE)?;
        Ok(self.settings.clone())
    }
}
