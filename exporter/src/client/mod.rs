//! Cluster-administration boundary
//!
//! The exporter never talks to the cluster directly; it goes through a
//! [`ClusterClient`], one method per administrative lookup. The REST
//! implementation lives in [`rest`]; tests plug in in-memory clients.

pub mod rest;

pub use rest::RestClusterClient;

use crate::settings::IndicesOptions;
use async_trait::async_trait;
use osprom_shared::{ClusterHealth, ClusterSettingsLayers, IndicesStats, LocalNodeInfo, NodeStats};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http transport error: {0}")]
    Http(#[from] hyper::Error),

    #[error("failed to build request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("invalid uri: {0}")]
    InvalidUri(#[from] hyper::http::uri::InvalidUri),

    #[error("unsupported url scheme [{0}], only http is supported")]
    UnsupportedScheme(String),

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Missing(String),
}

/// Detail level of a health request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthLevel {
    Cluster,
    Indices,
    Shards,
}

impl HealthLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::Indices => "indices",
            Self::Shards => "shards",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthRequest {
    /// Answer from the receiving node's view of the cluster state
    pub local: bool,
    pub level: HealthLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodesInfoRequest {
    pub selector: String,

    /// Only identity (cluster name, node name, node id)
    pub minimal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodesStatsRequest {
    pub selector: String,

    /// Every stats section
    pub all: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicesStatsRequest {
    /// Empty selects every index
    pub indices: Vec<String>,
    pub options: IndicesOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterStateRequest {
    pub metadata_only: bool,

    /// `false` routes the request to the elected cluster-manager node
    pub local: bool,
}

/// Administrative lookups the collection pipeline depends on.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn cluster_health(&self, request: &HealthRequest) -> Result<ClusterHealth, ClientError>;

    async fn nodes_info(&self, request: &NodesInfoRequest) -> Result<LocalNodeInfo, ClientError>;

    async fn nodes_stats(&self, request: &NodesStatsRequest) -> Result<Vec<NodeStats>, ClientError>;

    async fn indices_stats(&self, request: &IndicesStatsRequest) -> Result<IndicesStats, ClientError>;

    /// Settings layers from the cluster state metadata.
    async fn cluster_state(&self, request: &ClusterStateRequest) -> Result<ClusterSettingsLayers, ClientError>;
}

#[async_trait]
impl<C: ClusterClient + ?Sized> ClusterClient for Arc<C> {
    async fn cluster_health(&self, request: &HealthRequest) -> Result<ClusterHealth, ClientError> {
        (**self).cluster_health(request).await
    }

    async fn nodes_info(&self, request: &NodesInfoRequest) -> Result<LocalNodeInfo, ClientError> {
        (**self).nodes_info(request).await
    }

    async fn nodes_stats(&self, request: &NodesStatsRequest) -> Result<Vec<NodeStats>, ClientError> {
        (**self).nodes_stats(request).await
    }

    async fn indices_stats(&self, request: &IndicesStatsRequest) -> Result<IndicesStats, ClientError> {
        (**self).indices_stats(request).await
    }

    async fn cluster_state(&self, request: &ClusterStateRequest) -> Result<ClusterSettingsLayers, ClientError> {
        (**self).cluster_state(request).await
    }
}
