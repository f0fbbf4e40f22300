//! EMQX 5.x admin API (`/api/v5`)

use super::api::segment_path;
use super::{lenient_f64, lenient_u64, AdminApi, Dialect, DialectClient};
use crate::errors::{ClientError, Result};
use crate::types::{
    Authentication, Authorization, BrokerMetrics, ClusterStatus, DataBridge, DataSource,
    LicenseInfo, NodeStatus, ResourceStatus, RuleEngine,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Node {
    node: String,
    #[serde(default)]
    node_status: String,
    #[serde(default)]
    version: String,
    // milliseconds
    #[serde(default, deserialize_with = "lenient_u64")]
    uptime: u64,
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

#[derive(Debug, Default, Deserialize)]
struct MonitorCurrent {
    #[serde(default, deserialize_with = "lenient_f64")]
    received_msg_rate: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    sent_msg_rate: f64,
}

#[derive(Debug, Deserialize)]
struct Bridge {
    name: String,
    #[serde(rename = "type", default)]
    bridge_type: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct RulePage {
    #[serde(default)]
    data: Vec<Rule>,
}

#[derive(Debug, Deserialize)]
struct Rule {
    id: String,
    #[serde(default)]
    enable: bool,
}

#[derive(Debug, Deserialize)]
struct RuleMetricsResponse {
    #[serde(default)]
    node_metrics: Vec<NodeScoped<RuleCounters>>,
}

#[derive(Debug, Deserialize)]
struct NodeScoped<T> {
    node: String,
    metrics: T,
}

#[derive(Debug, Default, Deserialize)]
struct RuleCounters {
    #[serde(default, deserialize_with = "lenient_u64")]
    matched: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    passed: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    failed: u64,
    #[serde(rename = "failed.no_result", default, deserialize_with = "lenient_u64")]
    no_result: u64,
    #[serde(rename = "matched.rate", default, deserialize_with = "lenient_f64")]
    rate: f64,
    #[serde(rename = "matched.rate.last5m", default, deserialize_with = "lenient_f64")]
    rate_last5m: f64,
    #[serde(rename = "matched.rate.max", default, deserialize_with = "lenient_f64")]
    rate_max: f64,
    #[serde(rename = "actions.total", default, deserialize_with = "lenient_u64")]
    actions_total: u64,
    #[serde(rename = "actions.success", default, deserialize_with = "lenient_u64")]
    actions_success: u64,
    #[serde(rename = "actions.failed", default, deserialize_with = "lenient_u64")]
    actions_failed: u64,
}

#[derive(Debug, Deserialize)]
struct Authenticator {
    id: String,
    #[serde(default = "enabled")]
    enable: bool,
}

#[derive(Debug, Deserialize)]
struct AuthzSources {
    #[serde(default)]
    sources: Vec<AuthzSource>,
}

#[derive(Debug, Deserialize)]
struct AuthzSource {
    #[serde(rename = "type")]
    source_type: String,
    #[serde(default = "enabled")]
    enable: bool,
}

/// Status document shared by authenticators and authorization sources
#[derive(Debug, Deserialize)]
struct AuthStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    node_metrics: Vec<NodeScoped<AuthCounters>>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthCounters {
    #[serde(default, deserialize_with = "lenient_u64")]
    total: u64,
    // authentication reports success/failed, authorization allow/deny
    #[serde(default, alias = "allow", deserialize_with = "lenient_u64")]
    success: u64,
    #[serde(default, alias = "deny", deserialize_with = "lenient_u64")]
    failed: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    nomatch: u64,
    #[serde(default, deserialize_with = "lenient_f64")]
    rate: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    rate_max: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    rate_last5m: f64,
}

fn enabled() -> bool {
    true
}

/// Client for the 5.x dialect
#[derive(Debug, Clone)]
pub struct V5Client {
    api: AdminApi,
}

impl V5Client {
    pub fn new(api: AdminApi) -> Self {
        Self { api }
    }

    async fn auth_status(&self, path: &str) -> Result<AuthStatus> {
        self.api.get_json(path).await
    }
}

#[async_trait]
impl DialectClient for V5Client {
    fn dialect(&self) -> Dialect {
        Dialect::V5
    }

    async fn get_cluster_status(&self) -> Result<ClusterStatus> {
        let nodes: Vec<Node> = self.api.get_json("/api/v5/nodes").await?;
        let nodes = nodes
            .into_iter()
            .map(|n| NodeStatus {
                running: n.node_status.eq_ignore_ascii_case("running"),
                uptime_secs: n.uptime / 1000,
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
        let Some(license) = self.api.get_optional_json::<License>("/api/v5/license").await? else {
            return Ok(None);
        };
        Ok(Some(LicenseInfo {
            max_client_limit: license.max_connections,
            expiration: parse_expiry(&license.expiry_at)?,
            remaining_days: 0.0,
        }))
    }

    async fn get_broker_metrics(&self) -> Result<BrokerMetrics> {
        let metrics: serde_json::Value =
            self.api.get_json("/api/v5/metrics?aggregate=true").await?;
        let stats: serde_json::Value = self.api.get_json("/api/v5/stats?aggregate=true").await?;
        let current: MonitorCurrent = self.api.get_json("/api/v5/monitor_current").await?;

        Ok(BrokerMetrics {
            messages_received: aggregate(&metrics, "messages.received"),
            messages_sent: aggregate(&metrics, "messages.sent"),
            messages_dropped: aggregate(&metrics, "messages.dropped"),
            messages_retained: aggregate(&stats, "retained.count"),
            connections: aggregate(&stats, "connections.count"),
            subscriptions: aggregate(&stats, "subscriptions.count"),
            topics: aggregate(&stats, "topics.count"),
            sessions: aggregate(&stats, "sessions.count"),
            received_msg_rate: current.received_msg_rate,
            sent_msg_rate: current.sent_msg_rate,
        })
    }

    async fn get_data_bridges(&self) -> Result<Vec<DataBridge>> {
        let bridges: Vec<Bridge> = self.api.get_json("/api/v5/bridges").await?;
        Ok(bridges
            .into_iter()
            .map(|b| DataBridge {
                status: ResourceStatus::parse(&b.status),
                name: b.name,
                bridge_type: b.bridge_type,
            })
            .collect())
    }

    async fn get_rule_engine_metrics(&self) -> Result<Vec<RuleEngine>> {
        let page: RulePage = self.api.get_json("/api/v5/rules?limit=10000").await?;
        let mut out = Vec::new();
        for rule in page.data {
            let resp: RuleMetricsResponse = self
                .api
                .get_json(&segment_path(&["api", "v5", "rules", &rule.id, "metrics"])?)
                .await?;
            out.extend(resp.node_metrics.into_iter().map(|n| RuleEngine {
                node_name: n.node,
                rule_id: rule.id.clone(),
                enabled: rule.enable,
                topic_hit_count: n.metrics.matched,
                exec_pass_count: n.metrics.passed,
                exec_failure_count: n.metrics.failed,
                no_result_count: n.metrics.no_result,
                exec_rate: n.metrics.rate,
                exec_last5m_rate: n.metrics.rate_last5m,
                exec_max_rate: n.metrics.rate_max,
                action_total: n.metrics.actions_total,
                action_success: n.metrics.actions_success,
                action_failed: n.metrics.actions_failed,
            }));
        }
        Ok(out)
    }

    async fn get_authentication_metrics(&self) -> Result<(Vec<DataSource>, Vec<Authentication>)> {
        let authenticators: Vec<Authenticator> =
            self.api.get_json("/api/v5/authentication").await?;
        let mut sources = Vec::new();
        let mut metrics = Vec::new();
        for authn in authenticators.into_iter().filter(|a| a.enable) {
            let status = self
                .auth_status(&segment_path(&[
                    "api",
                    "v5",
                    "authentication",
                    &authn.id,
                    "status",
                ])?)
                .await?;
            sources.push(DataSource {
                resource_name: authn.id.clone(),
                status: ResourceStatus::parse(&status.status),
            });
            metrics.extend(status.node_metrics.into_iter().map(|n| Authentication {
                node_name: n.node,
                resource_name: authn.id.clone(),
                total: n.metrics.total,
                allow_count: n.metrics.success,
                deny_count: n.metrics.failed,
                nomatch_count: n.metrics.nomatch,
                exec_rate: n.metrics.rate,
                exec_last5m_rate: n.metrics.rate_last5m,
                exec_max_rate: n.metrics.rate_max,
            }));
        }
        Ok((sources, metrics))
    }

    async fn get_authorization_metrics(&self) -> Result<(Vec<DataSource>, Vec<Authorization>)> {
        let authz: AuthzSources = self.api.get_json("/api/v5/authorization/sources").await?;
        let mut sources = Vec::new();
        let mut metrics = Vec::new();
        for source in authz.sources.into_iter().filter(|s| s.enable) {
            let status = self
                .auth_status(&segment_path(&[
                    "api",
                    "v5",
                    "authorization",
                    "sources",
                    &source.source_type,
                    "status",
                ])?)
                .await?;
            sources.push(DataSource {
                resource_name: source.source_type.clone(),
                status: ResourceStatus::parse(&status.status),
            });
            metrics.extend(status.node_metrics.into_iter().map(|n| Authorization {
                node_name: n.node,
                resource_name: source.source_type.clone(),
                total: n.metrics.total,
                allow_count: n.metrics.success,
                deny_count: n.metrics.failed,
                nomatch_count: n.metrics.nomatch,
                exec_rate: n.metrics.rate,
                exec_last5m_rate: n.metrics.rate_last5m,
                exec_max_rate: n.metrics.rate_max,
            }));
        }
        Ok((sources, metrics))
    }
}

/// Reads `key` from an aggregated object, or sums it across a per-node list.
fn aggregate(value: &serde_json::Value, key: &str) -> u64 {
    let read = |v: &serde_json::Value| {
        v.get(key)
            .and_then(|n| n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)))
            .unwrap_or_default()
    };
    match value {
        serde_json::Value::Array(nodes) => nodes.iter().map(read).sum(),
        other => read(other),
    }
}

/// License expiry comes as a plain date ("2029-04-30") or as RFC 3339.
fn parse_expiry(expiry_at: &str) -> Result<i64> {
    let expiry_at = expiry_at.trim();
    if let Ok(date) = NaiveDate::parse_from_str(expiry_at, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().timestamp_millis());
        }
    }
    DateTime::parse_from_rfc3339(expiry_at)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| ClientError::Decode(format!("license expiry_at {expiry_at:?}: {e}")))
}
