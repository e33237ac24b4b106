//! Context label helpers
//!
//! Every cluster-scoped series carries a leading `cluster` label and every
//! node-scoped series carries `cluster`, `node` and `nodeid`. These helpers
//! prepend the context to the caller's label names or values, preserving the
//! caller's order.

use osprom_shared::{LocalNodeInfo, NodeStats};

pub const CLUSTER_LABEL: &str = "cluster";
pub const NODE_LABEL: &str = "node";
pub const NODE_ID_LABEL: &str = "nodeid";

/// Number of context labels a scope prepends.
pub const CLUSTER_CONTEXT_LEN: usize = 1;
pub const NODE_CONTEXT_LEN: usize = 3;

/// Identity of the node a node-scoped sample belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeContext {
    pub name: String,
    pub id: String,
}

impl NodeContext {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

impl From<&LocalNodeInfo> for NodeContext {
    fn from(info: &LocalNodeInfo) -> Self {
        Self::new(info.node_name.as_str(), info.node_id.as_str())
    }
}

impl From<&NodeStats> for NodeContext {
    fn from(stats: &NodeStats) -> Self {
        Self::new(stats.name.as_str(), stats.id.as_str())
    }
}

/// `["cluster"] ++ names`
pub fn extend_cluster_labels(names: &[&str]) -> Vec<String> {
    std::iter::once(CLUSTER_LABEL)
        .chain(names.iter().copied())
        .map(str::to_string)
        .collect()
}

/// `["cluster", "node", "nodeid"] ++ names`
pub fn extend_node_labels(names: &[&str]) -> Vec<String> {
    [CLUSTER_LABEL, NODE_LABEL, NODE_ID_LABEL]
        .into_iter()
        .chain(names.iter().copied())
        .map(str::to_string)
        .collect()
}

/// `[cluster] ++ values`
pub fn cluster_label_values(cluster: &str, values: &[&str]) -> Vec<String> {
    std::iter::once(cluster)
        .chain(values.iter().copied())
        .map(str::to_string)
        .collect()
}

/// `[cluster, node.name, node.id] ++ values`
pub fn node_label_values(cluster: &str, node: &NodeContext, values: &[&str]) -> Vec<String> {
    [cluster, node.name.as_str(), node.id.as_str()]
        .into_iter()
        .chain(values.iter().copied())
        .map(str::to_string)
        .collect()
}
