//! Version-specific adapters for the EMQX admin API
//!
//! Each dialect speaks one shape of the REST API. [`DialectClient::get_cluster_status`]
//! doubles as the liveness probe used by the discovery loop.

mod api;
pub mod v4;
pub mod v5;

pub use api::AdminApi;
pub use v4::V4Client;
pub use v5::V5Client;

use crate::errors::Result;
use crate::types::{
    Authentication, Authorization, BrokerMetrics, ClusterStatus, DataBridge, DataSource,
    LicenseInfo, RuleEngine,
};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;

/// Known admin API dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    V4,
    V5,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::V4 => write!(f, "v4"),
            Dialect::V5 => write!(f, "v5"),
        }
    }
}

#[async_trait]
pub trait DialectClient: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Also used as the compatibility probe during discovery.
    async fn get_cluster_status(&self) -> Result<ClusterStatus>;

    /// `None` when the broker carries no license (open source edition).
    async fn get_license(&self) -> Result<Option<LicenseInfo>>;

    async fn get_broker_metrics(&self) -> Result<BrokerMetrics>;

    async fn get_data_bridges(&self) -> Result<Vec<DataBridge>>;

    async fn get_rule_engine_metrics(&self) -> Result<Vec<RuleEngine>>;

    async fn get_authentication_metrics(&self) -> Result<(Vec<DataSource>, Vec<Authentication>)>;

    async fn get_authorization_metrics(&self) -> Result<(Vec<DataSource>, Vec<Authorization>)>;
}

/// Builds one client per dialect, in the given order, over a shared transport.
pub fn build_dialects(api: &AdminApi, order: &[Dialect]) -> Vec<Arc<dyn DialectClient>> {
    order
        .iter()
        .map(|dialect| -> Arc<dyn DialectClient> {
            match dialect {
                Dialect::V4 => Arc::new(V4Client::new(api.clone())),
                Dialect::V5 => Arc::new(V5Client::new(api.clone())),
            }
        })
        .collect()
}

// The v4 API encodes some gauges as strings ("0.25"), v5 as numbers.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or_default(),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    })
}

pub(crate) fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
            .unwrap_or_default(),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "lenient_f64")]
        load: f64,
        #[serde(deserialize_with = "lenient_u64")]
        fds: u64,
    }

    #[test]
    fn test_lenient_numbers() {
        let s: Sample = serde_json::from_str(r#"{"load":"0.25","fds":1024}"#).unwrap();
        assert_eq!(s.load, 0.25);
        assert_eq!(s.fds, 1024);

        let s: Sample = serde_json::from_str(r#"{"load":1.5,"fds":"77"}"#).unwrap();
        assert_eq!(s.load, 1.5);
        assert_eq!(s.fds, 77);

        let s: Sample = serde_json::from_str(r#"{"load":null,"fds":"n/a"}"#).unwrap();
        assert_eq!(s.load, 0.0);
        assert_eq!(s.fds, 0);
    }

    #[test]
    fn test_dialect_serde() {
        let order: Vec<Dialect> = serde_json::from_str(r#"["v5","v4"]"#).unwrap();
        assert_eq!(order, vec![Dialect::V5, Dialect::V4]);
        assert_eq!(Dialect::V4.to_string(), "v4");
    }
}
