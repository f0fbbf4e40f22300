//! EMQX 4.x admin API (`/api/v4`)
//!
//! Every response is wrapped in a `{"code": 0, "data": ...}` envelope and
//! node-scoped endpoints answer with one entry per cluster node.

use super::{lenient_f64, lenient_u64, AdminApi, Dialect, DialectClient};
use crate::errors::{ClientError, Result};
use crate::types::{
    Authentication, Authorization, BrokerMetrics, ClusterStatus, DataBridge, DataSource,
    LicenseInfo, NodeStatus, ResourceStatus, RuleEngine,
};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T> {
        if self.code != 0 {
            return Err(ClientError::Api {
                code: self.code,
                message: self.message.unwrap_or_default(),
            });
        }
        self.data
            .ok_or_else(|| ClientError::Decode("envelope carries no data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct Node {
    node: String,
    #[serde(default)]
    node_status: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    uptime: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    max_fds: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    connections: u64,
    #[serde(default, deserialize_with = "lenient_f64")]
    load1: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    load5: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    load15: f64,
}

#[derive(Debug, Deserialize)]
struct License {
    #[serde(default, deserialize_with = "lenient_u64")]
    max_connections: u64,
    expiry_at: String,
}

#[derive(Debug, Deserialize)]
struct NodeMetrics {
    #[serde(default)]
    metrics: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct NodeStats {
    #[serde(default)]
    stats: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    id: String,
    #[serde(rename = "type", default)]
    resource_type: String,
    status: Option<Vec<ResourceNodeStatus>>,
}

#[derive(Debug, Deserialize)]
struct ResourceNodeStatus {
    #[serde(default)]
    is_alive: bool,
}

#[derive(Debug, Deserialize)]
struct Rule {
    id: String,
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    metrics: Vec<RuleNodeMetrics>,
    #[serde(default)]
    actions: Vec<RuleAction>,
}

#[derive(Debug, Deserialize)]
struct RuleNodeMetrics {
    node: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    matched: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    passed: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    failed: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    no_result: u64,
    #[serde(default, deserialize_with = "lenient_f64")]
    speed: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    speed_max: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    speed_last5m: f64,
}

#[derive(Debug, Deserialize)]
struct RuleAction {
    #[serde(default)]
    metrics: Vec<ActionNodeMetrics>,
}

#[derive(Debug, Deserialize)]
struct ActionNodeMetrics {
    node: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    success: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    failed: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    taken: u64,
}

/// Client for the legacy dialect
#[derive(Debug, Clone)]
pub struct V4Client {
    api: AdminApi,
}

impl V4Client {
    pub fn new(api: AdminApi) -> Self {
        Self { api }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let envelope: Envelope<T> = self.api.get_json(&format!("/api/v4{path}")).await?;
        envelope.into_data()
    }
}

#[async_trait]
impl DialectClient for V4Client {
    fn dialect(&self) -> Dialect {
        Dialect::V4
    }

    async fn get_cluster_status(&self) -> Result<ClusterStatus> {
        let nodes: Vec<Node> = self.get("/nodes").await?;
        let nodes = nodes
            .into_iter()
            .map(|n| NodeStatus {
                running: n.node_status.eq_ignore_ascii_case("running"),
                uptime_secs: parse_uptime(&n.uptime),
                node_name: n.node,
                version: n.version,
                max_fds: n.max_fds,
                connections: n.connections,
                load1: n.load1,
                load5: n.load5,
                load15: n.load15,
            })
            .collect();
        Ok(ClusterStatus::from_nodes(nodes))
    }

    async fn get_license(&self) -> Result<Option<LicenseInfo>> {
        let envelope: Option<Envelope<License>> =
            self.api.get_optional_json("/api/v4/license_info").await?;
        let Some(envelope) = envelope else {
            return Ok(None);
        };
        let license = envelope.into_data()?;
        let expiry = NaiveDateTime::parse_from_str(license.expiry_at.trim(), "%Y-%m-%d %H:%M:%S")
            .map_err(|e| {
                ClientError::Decode(format!("license expiry_at {:?}: {e}", license.expiry_at))
            })?;
        Ok(Some(LicenseInfo {
            max_client_limit: license.max_connections,
            expiration: expiry.and_utc().timestamp_millis(),
            remaining_days: 0.0,
        }))
    }

    async fn get_broker_metrics(&self) -> Result<BrokerMetrics> {
        let metrics: Vec<NodeMetrics> = self.get("/metrics").await?;
        let stats: Vec<NodeStats> = self.get("/stats").await?;

        let sum_metric =
            |key: &str| -> u64 { metrics.iter().map(|m| counter(&m.metrics, key)).sum() };
        let sum_stat = |key: &str| -> u64 { stats.iter().map(|s| counter(&s.stats, key)).sum() };
        // topics and retained messages are replicated, every node reports the cluster value
        let max_stat = |key: &str| -> u64 {
            stats
                .iter()
                .map(|s| counter(&s.stats, key))
                .max()
                .unwrap_or_default()
        };

        Ok(BrokerMetrics {
            messages_received: sum_metric("messages.received"),
            messages_sent: sum_metric("messages.sent"),
            messages_dropped: sum_metric("messages.dropped"),
            messages_retained: max_stat("retained.count"),
            connections: sum_stat("connections.count"),
            subscriptions: sum_stat("subscriptions.count"),
            topics: max_stat("topics.count"),
            sessions: sum_stat("sessions.count"),
            received_msg_rate: 0.0,
            sent_msg_rate: 0.0,
        })
    }

    async fn get_data_bridges(&self) -> Result<Vec<DataBridge>> {
        let resources: Vec<Resource> = self.get("/resources").await?;
        Ok(resources
            .into_iter()
            .map(|r| {
                let status = match r.status.as_deref() {
                    None | Some([]) => ResourceStatus::Unknown,
                    Some(nodes) if nodes.iter().all(|n| n.is_alive) => ResourceStatus::Connected,
                    Some(_) => ResourceStatus::Disconnected,
                };
                DataBridge {
                    name: r.id,
                    bridge_type: r.resource_type,
                    status,
                }
            })
            .collect())
    }

    async fn get_rule_engine_metrics(&self) -> Result<Vec<RuleEngine>> {
        let rules: Vec<Rule> = self.get("/rules").await?;
        let mut out = Vec::new();
        for rule in rules {
            // action counters are reported per action, fold them per node
            let mut actions: BTreeMap<&str, (u64, u64, u64)> = BTreeMap::new();
            for metric in rule.actions.iter().flat_map(|a| a.metrics.iter()) {
                let entry = actions.entry(metric.node.as_str()).or_default();
                entry.0 += metric.taken.max(metric.success + metric.failed);
                entry.1 += metric.success;
                entry.2 += metric.failed;
            }

            for m in &rule.metrics {
                let (action_total, action_success, action_failed) =
                    actions.get(m.node.as_str()).copied().unwrap_or_default();
                out.push(RuleEngine {
                    node_name: m.node.clone(),
                    rule_id: rule.id.clone(),
                    enabled: rule.enabled,
                    topic_hit_count: m.matched,
                    exec_pass_count: m.passed,
                    exec_failure_count: m.failed,
                    no_result_count: m.no_result,
                    exec_rate: m.speed,
                    exec_last5m_rate: m.speed_last5m,
                    exec_max_rate: m.speed_max,
                    action_total,
                    action_success,
                    action_failed,
                });
            }
        }
        Ok(out)
    }

    // 4.x exposes authn/authz through plugins without per-backend metrics
    async fn get_authentication_metrics(&self) -> Result<(Vec<DataSource>, Vec<Authentication>)> {
        Ok((Vec::new(), Vec::new()))
    }

    async fn get_authorization_metrics(&self) -> Result<(Vec<DataSource>, Vec<Authorization>)> {
        Ok((Vec::new(), Vec::new()))
    }
}

fn counter(values: &HashMap<String, serde_json::Value>, key: &str) -> u64 {
    values
        .get(key)
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
        .unwrap_or_default()
}

/// Parses the human readable uptime, e.g. "2 days, 3 hours, 4 minutes, 5 seconds".
pub(crate) fn parse_uptime(uptime: &str) -> u64 {
    uptime
        .split(',')
        .filter_map(|part| {
            let mut words = part.split_whitespace();
            let amount: u64 = words.next()?.parse().ok()?;
            let unit = words.next()?.to_ascii_lowercase();
            let scale = match unit.trim_end_matches('s') {
                "day" => 86_400,
                "hour" => 3_600,
                "minute" => 60,
                "second" => 1,
                _ => return None,
            };
            Some(amount.saturating_mul(scale))
        })
        .fold(0u64, u64::saturating_add)
}
