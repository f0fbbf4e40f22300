use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

pub(crate) struct Metric {
    pub name: &'static str,
    description: &'static str,
}

// Families rebuilt from the cluster on every scrape
pub(crate) const COUNTERS: [Metric; 6] = [
    MESSAGES_RECEIVED,
    MESSAGES_SENT,
    MESSAGES_DROPPED,
    RULE_TOPIC_HIT_COUNT,
    RULE_EXEC_PASS_COUNT,
    RULE_EXEC_FAILURE_COUNT,
];

pub(crate) const GAUGES: [Metric; 37] = [
    LICENSE_MAX_CLIENT_LIMIT,
    LICENSE_EXPIRATION_TIME,
    LICENSE_REMAINING_DAYS,
    CLUSTER_STATUS,
    CLUSTER_NODES_RUNNING,
    CLUSTER_NODES_STOPPED,
    CLUSTER_NODE_UPTIME,
    CLUSTER_NODE_MAX_FDS,
    CLUSTER_NODE_CONNECTIONS,
    CLUSTER_CPU_LOAD,
    MESSAGES_RETAINED,
    CONNECTIONS_COUNT,
    SUBSCRIPTIONS_COUNT,
    TOPICS_COUNT,
    SESSIONS_COUNT,
    MESSAGES_INPUT_RATE,
    MESSAGES_OUTPUT_RATE,
    DATA_BRIDGE_STATUS,
    RULE_ENABLED,
    RULE_NO_RESULT_COUNT,
    RULE_EXEC_RATE,
    RULE_EXEC_LAST5M_RATE,
    RULE_EXEC_MAX_RATE,
    RULE_ACTION_TOTAL,
    RULE_ACTION_SUCCESS,
    RULE_ACTION_FAILED,
    AUTHENTICATION_RESOURCE_STATUS,
    AUTHENTICATION_TOTAL,
    AUTHENTICATION_ALLOW_COUNT,
    AUTHENTICATION_DENY_COUNT,
    AUTHENTICATION_NOMATCH_COUNT,
    AUTHENTICATION_EXEC_RATE,
    AUTHORIZATION_RESOURCE_STATUS,
    AUTHORIZATION_TOTAL,
    AUTHORIZATION_ALLOW_COUNT,
    AUTHORIZATION_DENY_COUNT,
    AUTHORIZATION_NOMATCH_COUNT,
];

// LICENSE Metrics --------------------------

pub(crate) const LICENSE_MAX_CLIENT_LIMIT: Metric = Metric {
    name: "emqx_license_max_client_limit",
    description: "Maximum number of concurrent clients allowed by the license",
};

pub(crate) const LICENSE_EXPIRATION_TIME: Metric = Metric {
    name: "emqx_license_expiration_time",
    description: "License expiration as a unix timestamp in milliseconds",
};

pub(crate) const LICENSE_REMAINING_DAYS: Metric = Metric {
    name: "emqx_license_remaining_days",
    description: "Days left until the license expires, one decimal",
};

// CLUSTER Metrics --------------------------

pub(crate) const CLUSTER_STATUS: Metric = Metric {
    name: "emqx_cluster_status",
    description: "Cluster health (1=healthy, 0=unhealthy or unknown)",
};

pub(crate) const CLUSTER_NODES_RUNNING: Metric = Metric {
    name: "emqx_cluster_nodes_running",
    description: "Number of running nodes in the cluster",
};

pub(crate) const CLUSTER_NODES_STOPPED: Metric = Metric {
    name: "emqx_cluster_nodes_stopped",
    description: "Number of stopped nodes in the cluster",
};

pub(crate) const CLUSTER_NODE_UPTIME: Metric = Metric {
    name: "emqx_cluster_node_uptime",
    description: "Node uptime in seconds",
};

pub(crate) const CLUSTER_NODE_MAX_FDS: Metric = Metric {
    name: "emqx_cluster_node_max_fds",
    description: "Maximum file descriptors available to the node",
};

pub(crate) const CLUSTER_NODE_CONNECTIONS: Metric = Metric {
    name: "emqx_cluster_node_connections",
    description: "Client connections held by the node",
};

pub(crate) const CLUSTER_CPU_LOAD: Metric = Metric {
    name: "emqx_cluster_cpu_load",
    description: "Node CPU load average, labelled load1/load5/load15",
};

// BROKER Metrics --------------------------

pub(crate) const MESSAGES_RECEIVED: Metric = Metric {
    name: "emqx_messages_received",
    description: "Total messages received from clients (msg)",
};

pub(crate) const MESSAGES_SENT: Metric = Metric {
    name: "emqx_messages_sent",
    description: "Total messages sent to clients (msg)",
};

pub(crate) const MESSAGES_DROPPED: Metric = Metric {
    name: "emqx_messages_dropped",
    description: "Total messages dropped before forwarding (msg)",
};

pub(crate) const MESSAGES_RETAINED: Metric = Metric {
    name: "emqx_messages_retained",
    description: "Retained messages currently stored",
};

pub(crate) const CONNECTIONS_COUNT: Metric = Metric {
    name: "emqx_connections_count",
    description: "Current client connections across the cluster",
};

pub(crate) const SUBSCRIPTIONS_COUNT: Metric = Metric {
    name: "emqx_subscriptions_count",
    description: "Current subscriptions across the cluster",
};

pub(crate) const TOPICS_COUNT: Metric = Metric {
    name: "emqx_topics_count",
    description: "Current topics in the cluster",
};

pub(crate) const SESSIONS_COUNT: Metric = Metric {
    name: "emqx_sessions_count",
    description: "Current sessions across the cluster",
};

pub(crate) const MESSAGES_INPUT_RATE: Metric = Metric {
    name: "emqx_messages_input_period_second",
    description: "Messages received per second",
};

pub(crate) const MESSAGES_OUTPUT_RATE: Metric = Metric {
    name: "emqx_messages_output_period_second",
    description: "Messages sent per second",
};

// RULE ENGINE Metrics --------------------------

pub(crate) const DATA_BRIDGE_STATUS: Metric = Metric {
    name: "emqx_rule_bridge_status",
    description: "Data bridge status (0=disconnected, 1=connected, 2=connecting, -1=unknown)",
};

pub(crate) const RULE_ENABLED: Metric = Metric {
    name: "emqx_rule_enabled",
    description: "Whether the rule is enabled (1) or disabled (0)",
};

pub(crate) const RULE_TOPIC_HIT_COUNT: Metric = Metric {
    name: "emqx_rule_topic_hit_count",
    description: "Messages that matched the rule's topic filter",
};

pub(crate) const RULE_EXEC_PASS_COUNT: Metric = Metric {
    name: "emqx_rule_exec_pass_count",
    description: "Rule executions that passed the SQL condition",
};

pub(crate) const RULE_EXEC_FAILURE_COUNT: Metric = Metric {
    name: "emqx_rule_exec_failure_count",
    description: "Rule executions that failed",
};

pub(crate) const RULE_NO_RESULT_COUNT: Metric = Metric {
    name: "emqx_rule_exec_no_result_count",
    description: "Rule executions that produced no result",
};

pub(crate) const RULE_EXEC_RATE: Metric = Metric {
    name: "emqx_rule_exec_rate",
    description: "Current rule execution rate per second",
};

pub(crate) const RULE_EXEC_LAST5M_RATE: Metric = Metric {
    name: "emqx_rule_exec_last5m_rate",
    description: "Average rule execution rate over the last five minutes",
};

pub(crate) const RULE_EXEC_MAX_RATE: Metric = Metric {
    name: "emqx_rule_exec_max_rate",
    description: "Peak rule execution rate",
};

pub(crate) const RULE_ACTION_TOTAL: Metric = Metric {
    name: "emqx_rule_action_total",
    description: "Actions triggered by the rule",
};

pub(crate) const RULE_ACTION_SUCCESS: Metric = Metric {
    name: "emqx_rule_action_success",
    description: "Actions that completed successfully",
};

pub(crate) const RULE_ACTION_FAILED: Metric = Metric {
    name: "emqx_rule_action_failed",
    description: "Actions that failed",
};

// AUTHENTICATION Metrics --------------------------

pub(crate) const AUTHENTICATION_RESOURCE_STATUS: Metric = Metric {
    name: "emqx_authentication_resource_status",
    description: "Authenticator backend status (0=disconnected, 1=connected, 2=connecting, -1=unknown)",
};

pub(crate) const AUTHENTICATION_TOTAL: Metric = Metric {
    name: "emqx_authentication_total",
    description: "Authentication attempts handled by the backend",
};

pub(crate) const AUTHENTICATION_ALLOW_COUNT: Metric = Metric {
    name: "emqx_authentication_allow_count",
    description: "Successful authentications",
};

pub(crate) const AUTHENTICATION_DENY_COUNT: Metric = Metric {
    name: "emqx_authentication_deny_count",
    description: "Rejected authentications",
};

pub(crate) const AUTHENTICATION_NOMATCH_COUNT: Metric = Metric {
    name: "emqx_authentication_nomatch_count",
    description: "Authentications the backend could not decide",
};

pub(crate) const AUTHENTICATION_EXEC_RATE: Metric = Metric {
    name: "emqx_authentication_exec_rate",
    description: "Current authentication rate per second",
};

// AUTHORIZATION Metrics --------------------------

pub(crate) const AUTHORIZATION_RESOURCE_STATUS: Metric = Metric {
    name: "emqx_authorization_resource_status",
    description: "Authorization source status (0=disconnected, 1=connected, 2=connecting, -1=unknown)",
};

pub(crate) const AUTHORIZATION_TOTAL: Metric = Metric {
    name: "emqx_authorization_total",
    description: "Authorization checks handled by the source",
};

pub(crate) const AUTHORIZATION_ALLOW_COUNT: Metric = Metric {
    name: "emqx_authorization_allow_count",
    description: "Allowed authorization checks",
};

pub(crate) const AUTHORIZATION_DENY_COUNT: Metric = Metric {
    name: "emqx_authorization_deny_count",
    description: "Denied authorization checks",
};

pub(crate) const AUTHORIZATION_NOMATCH_COUNT: Metric = Metric {
    name: "emqx_authorization_nomatch_count",
    description: "Authorization checks the source could not decide",
};

// EXPORTER Metrics --------------------------

pub(crate) const EXPORTER_COLLECT_ERRORS_TOTAL: Metric = Metric {
    name: "emqx_exporter_collect_errors_total",
    description: "Scrape-time collector failures, labelled by collector",
};

pub(crate) const EXPORTER_CLUSTER_BOUND: Metric = Metric {
    name: "emqx_exporter_cluster_bound",
    description: "Admin API dialect the exporter is bound to (1=bound)",
};

/// Installs the process-wide recorder that holds the exporter's own metrics.
///
/// Cluster families never go through it, see [`describe_scrape_metrics`].
pub(crate) fn init_metrics() -> Result<PrometheusHandle> {
    info!("initializing metrics exporter");

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    describe_exporter_metrics();
    Ok(handle)
}

pub(crate) fn describe_exporter_metrics() {
    metrics::describe_counter!(
        EXPORTER_COLLECT_ERRORS_TOTAL.name,
        EXPORTER_COLLECT_ERRORS_TOTAL.description
    );
    metrics::describe_gauge!(EXPORTER_CLUSTER_BOUND.name, EXPORTER_CLUSTER_BOUND.description);
}

/// Describes the cluster families on the recorder of the current scrape.
pub(crate) fn describe_scrape_metrics() {
    for metric in COUNTERS {
        metrics::describe_counter!(metric.name, metric.description);
    }

    for metric in GAUGES {
        metrics::describe_gauge!(metric.name, metric.description);
    }
}
