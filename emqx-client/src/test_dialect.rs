//! Scripted in-process dialect used by the unit tests

use crate::dialect::{Dialect, DialectClient};
use crate::errors::{ClientError, Result};
use crate::types::{
    Authentication, Authorization, BrokerMetrics, ClusterStatus, DataBridge, DataSource,
    LicenseInfo, NodeStatus, ResourceStatus, RuleEngine,
};

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub(crate) struct ScriptedDialect {
    dialect: Dialect,
    healthy: AtomicBool,
    available_at: Option<Instant>,
    fail_broker: AtomicBool,
    bridge_delay: Duration,
    license_expiration: Option<i64>,
    probes: AtomicUsize,
}

impl ScriptedDialect {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            healthy: AtomicBool::new(true),
            available_at: None,
            fail_broker: AtomicBool::new(false),
            bridge_delay: Duration::ZERO,
            license_expiration: None,
            probes: AtomicUsize::new(0),
        }
    }

    pub(crate) fn unhealthy(self) -> Self {
        self.healthy.store(false, Ordering::SeqCst);
        self
    }

    /// Probes fail until the (tokio) clock reaches `at`.
    pub(crate) fn available_at(mut self, at: Instant) -> Self {
        self.available_at = Some(at);
        self
    }

    pub(crate) fn with_bridge_delay(mut self, delay: Duration) -> Self {
        self.bridge_delay = delay;
        self
    }

    pub(crate) fn with_license(mut self, expiration_ms: i64) -> Self {
        self.license_expiration = Some(expiration_ms);
        self
    }

    pub(crate) fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub(crate) fn fail_broker_metrics(&self) {
        self.fail_broker.store(true, Ordering::SeqCst);
    }

    pub(crate) fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    fn tag(&self) -> String {
        self.dialect.to_string()
    }

    fn unavailable(&self) -> ClientError {
        ClientError::UnexpectedStatus {
            status: 404,
            url: format!("scripted://{}/nodes", self.dialect),
        }
    }
}

/// Erases the concrete type so the list can feed a discovery loop.
pub(crate) fn candidates(dialects: &[&Arc<ScriptedDialect>]) -> Vec<Arc<dyn DialectClient>> {
    dialects
        .iter()
        .map(|d| Arc::clone(d) as Arc<dyn DialectClient>)
        .collect()
}

#[async_trait]
impl DialectClient for ScriptedDialect {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn get_cluster_status(&self) -> Result<ClusterStatus> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let reachable = self.available_at.map_or(true, |at| Instant::now() >= at);
        if !self.healthy.load(Ordering::SeqCst) || !reachable {
            return Err(self.unavailable());
        }
        Ok(ClusterStatus::from_nodes(vec![NodeStatus {
            node_name: format!("{}@127.0.0.1", self.tag()),
            running: true,
            ..Default::default()
        }]))
    }

    async fn get_license(&self) -> Result<Option<LicenseInfo>> {
        Ok(self.license_expiration.map(|expiration| LicenseInfo {
            max_client_limit: 100,
            expiration,
            remaining_days: 0.0,
        }))
    }

    async fn get_broker_metrics(&self) -> Result<BrokerMetrics> {
        if self.fail_broker.load(Ordering::SeqCst) {
            return Err(ClientError::UnexpectedStatus {
                status: 503,
                url: format!("scripted://{}/metrics", self.dialect),
            });
        }
        Ok(BrokerMetrics {
            messages_received: 10,
            connections: 2,
            ..Default::default()
        })
    }

    async fn get_data_bridges(&self) -> Result<Vec<DataBridge>> {
        if !self.bridge_delay.is_zero() {
            tokio::time::sleep(self.bridge_delay).await;
        }
        Ok(vec![DataBridge {
            name: self.tag(),
            bridge_type: "webhook".to_string(),
            status: ResourceStatus::Connected,
        }])
    }

    async fn get_rule_engine_metrics(&self) -> Result<Vec<RuleEngine>> {
        Ok(vec![RuleEngine {
            node_name: format!("{}@127.0.0.1", self.tag()),
            rule_id: self.tag(),
            enabled: true,
            ..Default::default()
        }])
    }

    async fn get_authentication_metrics(&self) -> Result<(Vec<DataSource>, Vec<Authentication>)> {
        Ok((
            vec![DataSource {
                resource_name: self.tag(),
                status: ResourceStatus::Connected,
            }],
            vec![Authentication {
                resource_name: self.tag(),
                total: 1,
                ..Default::default()
            }],
        ))
    }

    async fn get_authorization_metrics(&self) -> Result<(Vec<DataSource>, Vec<Authorization>)> {
        Ok((
            vec![DataSource {
                resource_name: self.tag(),
                status: ResourceStatus::Connected,
            }],
            vec![Authorization {
                resource_name: self.tag(),
                total: 1,
                ..Default::default()
            }],
        ))
    }
}
