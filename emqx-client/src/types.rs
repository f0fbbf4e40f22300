//! Value objects produced by the dialect clients
//!
//! The facade passes these through untouched, except for
//! [`LicenseInfo::remaining_days`] which is derived at read time.

use serde::Serialize;

/// License snapshot, `expiration` is a unix timestamp in milliseconds
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LicenseInfo {
    pub max_client_limit: u64,
    pub expiration: i64,
    pub remaining_days: f64,
}

/// Overall health derived from the per-node running state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ClusterHealth {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl ClusterHealth {
    pub fn as_gauge(&self) -> f64 {
        match self {
            ClusterHealth::Healthy => 1.0,
            ClusterHealth::Unknown | ClusterHealth::Unhealthy => 0.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NodeStatus {
    pub node_name: String,
    pub running: bool,
    pub version: String,
    pub uptime_secs: u64,
    pub max_fds: u64,
    pub connections: u64,
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ClusterStatus {
    pub status: ClusterHealth,
    pub nodes: Vec<NodeStatus>,
}

impl ClusterStatus {
    /// Healthy only when the cluster reports at least one node and every node runs.
    pub fn from_nodes(nodes: Vec<NodeStatus>) -> Self {
        let status = if !nodes.is_empty() && nodes.iter().all(|n| n.running) {
            ClusterHealth::Healthy
        } else {
            ClusterHealth::Unhealthy
        };
        Self { status, nodes }
    }

    pub fn nodes_running(&self) -> usize {
        self.nodes.iter().filter(|n| n.running).count()
    }

    pub fn nodes_stopped(&self) -> usize {
        self.nodes.len() - self.nodes_running()
    }
}

/// Cluster-wide message and session counters
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BrokerMetrics {
    pub messages_received: u64,
    pub messages_sent: u64,
    pub messages_dropped: u64,
    pub messages_retained: u64,
    pub connections: u64,
    pub subscriptions: u64,
    pub topics: u64,
    pub sessions: u64,
    pub received_msg_rate: f64,
    pub sent_msg_rate: f64,
}

/// Connection state of a bridge or an auth backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ResourceStatus {
    Connected,
    Connecting,
    Disconnected,
    #[default]
    Unknown,
}

impl ResourceStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "connected" | "running" => ResourceStatus::Connected,
            "connecting" => ResourceStatus::Connecting,
            "disconnected" | "stopped" => ResourceStatus::Disconnected,
            _ => ResourceStatus::Unknown,
        }
    }

    /// 0=disconnected, 1=connected, 2=connecting, -1=unknown
    pub fn as_gauge(&self) -> f64 {
        match self {
            ResourceStatus::Disconnected => 0.0,
            ResourceStatus::Connected => 1.0,
            ResourceStatus::Connecting => 2.0,
            ResourceStatus::Unknown => -1.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DataBridge {
    pub name: String,
    pub bridge_type: String,
    pub status: ResourceStatus,
}

/// Per-node execution counters of one rule
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RuleEngine {
    pub node_name: String,
    pub rule_id: String,
    pub enabled: bool,
    pub topic_hit_count: u64,
    pub exec_pass_count: u64,
    pub exec_failure_count: u64,
    pub no_result_count: u64,
    pub exec_rate: f64,
    pub exec_last5m_rate: f64,
    pub exec_max_rate: f64,
    pub action_total: u64,
    pub action_success: u64,
    pub action_failed: u64,
}

/// Authentication backend or authorization source
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DataSource {
    pub resource_name: String,
    pub status: ResourceStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Authentication {
    pub node_name: String,
    pub resource_name: String,
    pub total: u64,
    pub allow_count: u64,
    pub deny_count: u64,
    pub nomatch_count: u64,
    pub exec_rate: f64,
    pub exec_last5m_rate: f64,
    pub exec_max_rate: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Authorization {
    pub node_name: String,
    pub resource_name: String,
    pub total: u64,
    pub allow_count: u64,
    pub deny_count: u64,
    pub nomatch_count: u64,
    pub exec_rate: f64,
    pub exec_last5m_rate: f64,
    pub exec_max_rate: f64,
}
