use crate::config::{DiscoveryOptions, EndpointConfig};
use crate::dialect::{build_dialects, AdminApi, Dialect, DialectClient};
use crate::discovery::DiscoveryLoop;
use crate::errors::{ClientError, Result};
use crate::types::{
    Authentication, Authorization, BrokerMetrics, ClusterStatus, DataBridge, DataSource,
    LicenseInfo, RuleEngine,
};

use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Lock-guarded reference to the currently bound dialect client
///
/// Readers take the shared lock just long enough to clone the handle,
/// the discovery loop takes the exclusive lock to swap it.
#[derive(Clone, Default)]
pub struct ClientSlot {
    inner: Arc<RwLock<Option<Arc<dyn DialectClient>>>>,
}

impl ClientSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<Arc<dyn DialectClient>> {
        self.inner.read().await.clone()
    }

    pub(crate) async fn bind(&self, client: Arc<dyn DialectClient>) {
        *self.inner.write().await = Some(client);
    }

    pub(crate) async fn reset(&self) {
        *self.inner.write().await = None;
    }
}

/// Cluster - the facade every metric collector goes through
///
/// Created unbound; the discovery loop spawned at construction binds a dialect
/// client in the background. While unbound every accessor returns empty data
/// and no error, so a discovery gap never turns into failed metric families.
#[derive(Clone)]
pub struct Cluster {
    slot: ClientSlot,
    discovery: Arc<JoinHandle<()>>,
}

impl Cluster {
    /// Builds the transport and the dialect clients for `endpoint`, then starts discovery.
    pub fn connect(
        endpoint: &EndpointConfig,
        options: DiscoveryOptions,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let api = AdminApi::new(endpoint)?;
        let candidates = build_dialects(&api, &options.dialects);
        Ok(Self::with_dialects(candidates, options, cancel))
    }

    /// Starts discovery over an explicit list of candidates, probed in order.
    pub fn with_dialects(
        candidates: Vec<Arc<dyn DialectClient>>,
        options: DiscoveryOptions,
        cancel: CancellationToken,
    ) -> Self {
        let slot = ClientSlot::new();
        let discovery = DiscoveryLoop::new(candidates, slot.clone(), &options).spawn(cancel);
        Self {
            slot,
            discovery: Arc::new(discovery),
        }
    }

    /// Dialect currently servicing accessor calls, if any.
    pub async fn bound_dialect(&self) -> Option<Dialect> {
        self.slot.current().await.map(|c| c.dialect())
    }

    /// True once the discovery loop has exited (bound in one-shot mode, or cancelled).
    pub fn is_discovery_finished(&self) -> bool {
        self.discovery.is_finished()
    }

    pub async fn get_license(&self) -> Result<Option<LicenseInfo>> {
        let Some(client) = self.slot.current().await else {
            return Ok(None);
        };
        let license = client
            .get_license()
            .await
            .map_err(|e| ClientError::collect("license", e))?;

        Ok(license.map(|mut lic| {
            lic.remaining_days = remaining_days(lic.expiration, chrono::Utc::now().timestamp_millis());
            lic
        }))
    }

    pub async fn get_cluster_status(&self) -> Result<ClusterStatus> {
        let Some(client) = self.slot.current().await else {
            return Ok(ClusterStatus::default());
        };
        client
            .get_cluster_status()
            .await
            .map_err(|e| ClientError::collect("cluster status", e))
    }

    pub async fn get_broker_metrics(&self) -> Result<Option<BrokerMetrics>> {
        let Some(client) = self.slot.current().await else {
            return Ok(None);
        };
        client
            .get_broker_metrics()
            .await
            .map(Some)
            .map_err(|e| ClientError::collect("broker metrics", e))
    }

    pub async fn get_rule_engine_metrics(&self) -> Result<(Vec<DataBridge>, Vec<RuleEngine>)> {
        let Some(client) = self.slot.current().await else {
            return Ok((Vec::new(), Vec::new()));
        };
        // both requests go to the same client, even if discovery rebinds meanwhile
        let bridges = client
            .get_data_bridges()
            .await
            .map_err(|e| ClientError::collect("rule engine data bridge", e))?;
        let rules = client
            .get_rule_engine_metrics()
            .await
            .map_err(|e| ClientError::collect("rule engine metrics", e))?;
        Ok((bridges, rules))
    }

    pub async fn get_authentication_metrics(
        &self,
    ) -> Result<(Vec<DataSource>, Vec<Authentication>)> {
        let Some(client) = self.slot.current().await else {
            return Ok((Vec::new(), Vec::new()));
        };
        client
            .get_authentication_metrics()
            .await
            .map_err(|e| ClientError::collect("authentication metrics", e))
    }

    pub async fn get_authorization_metrics(&self) -> Result<(Vec<DataSource>, Vec<Authorization>)> {
        let Some(client) = self.slot.current().await else {
            return Ok((Vec::new(), Vec::new()));
        };
        client
            .get_authorization_metrics()
            .await
            .map_err(|e| ClientError::collect("authorization metrics", e))
    }
}

/// Days left until `expiration_ms`, rounded to one decimal by formatting.
///
/// Rounding goes through `{:.1}` and back, so it follows the formatter on the
/// exact binary value of the quotient rather than `f64::round`.
pub fn remaining_days(expiration_ms: i64, now_ms: i64) -> f64 {
    let days = (expiration_ms - now_ms) as f64 / MILLIS_PER_DAY;
    format!("{days:.1}").parse().unwrap_or(days)
}
