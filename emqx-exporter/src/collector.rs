//! Scrape-time collectors
//!
//! Each collector pulls one category from the [`Cluster`] facade. The results
//! of a scrape are recorded into a recorder built for that scrape alone, so a
//! departed node, a deleted rule or a failed category leaves no stale series
//! behind. A failing collector is logged and counted on the long-lived
//! exporter recorder, the remaining ones still run.

use crate::exporter_metrics::*;

use emqx_client::types::{
    Authentication, Authorization, BrokerMetrics, ClusterStatus, DataBridge, DataSource,
    LicenseInfo, RuleEngine,
};
use emqx_client::{Cluster, Dialect, Result};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::warn;

pub(crate) const COLLECTORS: [&str; 6] = [
    "license",
    "cluster",
    "broker",
    "rule",
    "authentication",
    "authorization",
];

#[derive(Clone)]
pub(crate) struct Collector {
    cluster: Cluster,
    include_exporter_metrics: bool,
}

impl Collector {
    pub(crate) fn new(cluster: Cluster, include_exporter_metrics: bool) -> Self {
        Self {
            cluster,
            include_exporter_metrics,
        }
    }

    /// Runs every collector concurrently and returns the rendered exposition
    /// of this scrape's cluster families.
    pub(crate) async fn collect(&self) -> String {
        let cluster = &self.cluster;
        let (license, status, broker, rules, authn, authz) = tokio::join!(
            cluster.get_license(),
            cluster.get_cluster_status(),
            cluster.get_broker_metrics(),
            cluster.get_rule_engine_metrics(),
            cluster.get_authentication_metrics(),
            cluster.get_authorization_metrics(),
        );

        let recorder = PrometheusBuilder::new().build_recorder();
        let failed = metrics::with_local_recorder(&recorder, || {
            describe_scrape_metrics();

            let mut failed = Vec::new();
            record(&mut failed, "license", license, |lic| {
                if let Some(lic) = lic {
                    record_license(&lic);
                }
            });
            record(&mut failed, "cluster", status, |status| {
                record_cluster_status(&status)
            });
            record(&mut failed, "broker", broker, |broker| {
                if let Some(broker) = broker {
                    record_broker_metrics(&broker);
                }
            });
            record(&mut failed, "rule", rules, |(bridges, rules)| {
                record_rule_engine(&bridges, &rules)
            });
            record(&mut failed, "authentication", authn, |(sources, authn)| {
                record_authentication(&sources, &authn)
            });
            record(&mut failed, "authorization", authz, |(sources, authz)| {
                record_authorization(&sources, &authz)
            });
            failed
        });

        if self.include_exporter_metrics {
            for collector in failed {
                counter!(EXPORTER_COLLECT_ERRORS_TOTAL.name, "collector" => collector).increment(1);
            }
            record_binding(cluster.bound_dialect().await);
        }

        recorder.handle().render()
    }
}

/// Records a successful result, or logs the failure and remembers the collector.
fn record<T>(
    failed: &mut Vec<&'static str>,
    collector: &'static str,
    result: Result<T>,
    record: impl FnOnce(T),
) {
    match result {
        Ok(value) => record(value),
        Err(e) => {
            warn!(collector, error = %e, "collector failed");
            failed.push(collector);
        }
    }
}

pub(crate) fn record_license(license: &LicenseInfo) {
    gauge!(LICENSE_MAX_CLIENT_LIMIT.name).set(license.max_client_limit as f64);
    gauge!(LICENSE_EXPIRATION_TIME.name).set(license.expiration as f64);
    gauge!(LICENSE_REMAINING_DAYS.name).set(license.remaining_days);
}

pub(crate) fn record_cluster_status(status: &ClusterStatus) {
    gauge!(CLUSTER_STATUS.name).set(status.status.as_gauge());
    gauge!(CLUSTER_NODES_RUNNING.name).set(status.nodes_running() as f64);
    gauge!(CLUSTER_NODES_STOPPED.name).set(status.nodes_stopped() as f64);

    for node in &status.nodes {
        let name = node.node_name.clone();
        gauge!(CLUSTER_NODE_UPTIME.name, "node" => name.clone()).set(node.uptime_secs as f64);
        gauge!(CLUSTER_NODE_MAX_FDS.name, "node" => name.clone()).set(node.max_fds as f64);
        gauge!(CLUSTER_NODE_CONNECTIONS.name, "node" => name.clone())
            .set(node.connections as f64);
        for (load, value) in [("load1", node.load1), ("load5", node.load5), ("load15", node.load15)]
        {
            gauge!(CLUSTER_CPU_LOAD.name, "node" => name.clone(), "load" => load).set(value);
        }
    }
}

pub(crate) fn record_broker_metrics(broker: &BrokerMetrics) {
    counter!(MESSAGES_RECEIVED.name).absolute(broker.messages_received);
    counter!(MESSAGES_SENT.name).absolute(broker.messages_sent);
    counter!(MESSAGES_DROPPED.name).absolute(broker.messages_dropped);
    gauge!(MESSAGES_RETAINED.name).set(broker.messages_retained as f64);
    gauge!(CONNECTIONS_COUNT.name).set(broker.connections as f64);
    gauge!(SUBSCRIPTIONS_COUNT.name).set(broker.subscriptions as f64);
    gauge!(TOPICS_COUNT.name).set(broker.topics as f64);
    gauge!(SESSIONS_COUNT.name).set(broker.sessions as f64);
    gauge!(MESSAGES_INPUT_RATE.name).set(broker.received_msg_rate);
    gauge!(MESSAGES_OUTPUT_RATE.name).set(broker.sent_msg_rate);
}

pub(crate) fn record_rule_engine(bridges: &[DataBridge], rules: &[RuleEngine]) {
    for bridge in bridges {
        gauge!(
            DATA_BRIDGE_STATUS.name,
            "type" => bridge.bridge_type.clone(),
            "name" => bridge.name.clone()
        )
        .set(bridge.status.as_gauge());
    }

    for rule in rules {
        let labels = [
            ("node", rule.node_name.clone()),
            ("rule", rule.rule_id.clone()),
        ];
        gauge!(RULE_ENABLED.name, &labels).set(if rule.enabled { 1.0 } else { 0.0 });
        counter!(RULE_TOPIC_HIT_COUNT.name, &labels).absolute(rule.topic_hit_count);
        counter!(RULE_EXEC_PASS_COUNT.name, &labels).absolute(rule.exec_pass_count);
        counter!(RULE_EXEC_FAILURE_COUNT.name, &labels).absolute(rule.exec_failure_count);
        gauge!(RULE_NO_RESULT_COUNT.name, &labels).set(rule.no_result_count as f64);
        gauge!(RULE_EXEC_RATE.name, &labels).set(rule.exec_rate);
        gauge!(RULE_EXEC_LAST5M_RATE.name, &labels).set(rule.exec_last5m_rate);
        gauge!(RULE_EXEC_MAX_RATE.name, &labels).set(rule.exec_max_rate);
        gauge!(RULE_ACTION_TOTAL.name, &labels).set(rule.action_total as f64);
        gauge!(RULE_ACTION_SUCCESS.name, &labels).set(rule.action_success as f64);
        gauge!(RULE_ACTION_FAILED.name, &labels).set(rule.action_failed as f64);
    }
}

pub(crate) fn record_authentication(sources: &[DataSource], authn: &[Authentication]) {
    for source in sources {
        gauge!(AUTHENTICATION_RESOURCE_STATUS.name, "resource" => source.resource_name.clone())
            .set(source.status.as_gauge());
    }

    for m in authn {
        let labels = [
            ("node", m.node_name.clone()),
            ("resource", m.resource_name.clone()),
        ];
        gauge!(AUTHENTICATION_TOTAL.name, &labels).set(m.total as f64);
        gauge!(AUTHENTICATION_ALLOW_COUNT.name, &labels).set(m.allow_count as f64);
        gauge!(AUTHENTICATION_DENY_COUNT.name, &labels).set(m.deny_count as f64);
        gauge!(AUTHENTICATION_NOMATCH_COUNT.name, &labels).set(m.nomatch_count as f64);
        gauge!(AUTHENTICATION_EXEC_RATE.name, &labels).set(m.exec_rate);
    }
}

pub(crate) fn record_authorization(sources: &[DataSource], authz: &[Authorization]) {
    for source in sources {
        gauge!(AUTHORIZATION_RESOURCE_STATUS.name, "resource" => source.resource_name.clone())
            .set(source.status.as_gauge());
    }

    for m in authz {
        let labels = [
            ("node", m.node_name.clone()),
            ("resource", m.resource_name.clone()),
        ];
        gauge!(AUTHORIZATION_TOTAL.name, &labels).set(m.total as f64);
        gauge!(AUTHORIZATION_ALLOW_COUNT.name, &labels).set(m.allow_count as f64);
        gauge!(AUTHORIZATION_DENY_COUNT.name, &labels).set(m.deny_count as f64);
        gauge!(AUTHORIZATION_NOMATCH_COUNT.name, &labels).set(m.nomatch_count as f64);
    }
}

pub(crate) fn record_binding(bound: Option<Dialect>) {
    for dialect in [Dialect::V4, Dialect::V5] {
        let value = if bound == Some(dialect) { 1.0 } else { 0.0 };
        gauge!(EXPORTER_CLUSTER_BOUND.name, "dialect" => dialect.to_string()).set(value);
    }
}
