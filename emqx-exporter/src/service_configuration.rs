use anyhow::{bail, Context, Result};
use emqx_client::config::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_INTERVAL};
use emqx_client::{Dialect, DiscoveryOptions, EndpointConfig, Scheme, TlsOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

const REDACTED: &str = "<secret>";

/// configuration settings loaded from the config file
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct LoadConfiguration {
    /// Admin API of the EMQX cluster to scrape
    pub(crate) metrics: MetricsConfig,
    /// Dialect discovery tuning, defaults apply when absent
    #[serde(default)]
    pub(crate) discovery: Option<DiscoveryConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct MetricsConfig {
    /// host:port of the dashboard listener, without scheme
    pub(crate) target: String,
    pub(crate) api_key: Option<String>,
    pub(crate) api_secret: Option<String>,
    /// http (default) or https
    pub(crate) scheme: Option<String>,
    pub(crate) request_timeout_ms: Option<u64>,
    pub(crate) tls_config: Option<TlsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TlsConfig {
    pub(crate) ca_file: Option<PathBuf>,
    pub(crate) cert_file: Option<PathBuf>,
    pub(crate) key_file: Option<PathBuf>,
    #[serde(default)]
    pub(crate) insecure_skip_verify: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct DiscoveryConfig {
    pub(crate) retry_interval_secs: Option<u64>,
    /// absent means probe once and keep the first binding
    pub(crate) revalidate_interval_secs: Option<u64>,
    pub(crate) dialects: Option<Vec<Dialect>>,
}

/// validated settings the exporter runs with
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ServiceConfiguration {
    pub(crate) metrics: EndpointSettings,
    pub(crate) discovery: DiscoverySettings,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct EndpointSettings {
    pub(crate) target: String,
    pub(crate) scheme: Scheme,
    pub(crate) api_key: Option<String>,
    pub(crate) api_secret: Option<String>,
    pub(crate) request_timeout_ms: u64,
    pub(crate) tls_config: Option<TlsConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DiscoverySettings {
    pub(crate) retry_interval_secs: u64,
    pub(crate) revalidate_interval_secs: Option<u64>,
    pub(crate) dialects: Vec<Dialect>,
}

/// Implementing the TryFrom trait to validate LoadConfiguration into ServiceConfiguration
impl TryFrom<LoadConfiguration> for ServiceConfiguration {
    type Error = anyhow::Error;

    fn try_from(config: LoadConfiguration) -> Result<Self> {
        let metrics = config.metrics;

        let target = metrics.target.trim().trim_end_matches('/').to_string();
        if target.is_empty() {
            bail!("metrics.target must not be empty");
        }
        if target.contains("://") {
            bail!("metrics.target {target:?} must not carry a scheme, use metrics.scheme");
        }

        let scheme = match metrics.scheme.as_deref() {
            None => Scheme::Http,
            Some(raw) => raw.parse().context("invalid metrics.scheme")?,
        };

        let request_timeout_ms = metrics
            .request_timeout_ms
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT.as_millis() as u64);
        if request_timeout_ms == 0 {
            bail!("metrics.request_timeout_ms must be greater than 0");
        }

        if metrics.api_key.is_some() != metrics.api_secret.is_some() {
            bail!("metrics.api_key and metrics.api_secret must be set together");
        }

        if let Some(tls) = &metrics.tls_config {
            if tls.cert_file.is_some() != tls.key_file.is_some() {
                bail!("tls_config.cert_file and tls_config.key_file must be set together");
            }
        }

        let discovery = config.discovery.unwrap_or(DiscoveryConfig {
            retry_interval_secs: None,
            revalidate_interval_secs: None,
            dialects: None,
        });

        let retry_interval_secs = discovery
            .retry_interval_secs
            .unwrap_or(DEFAULT_RETRY_INTERVAL.as_secs());
        if retry_interval_secs == 0 {
            bail!("discovery.retry_interval_secs must be greater than 0");
        }
        if discovery.revalidate_interval_secs == Some(0) {
            bail!("discovery.revalidate_interval_secs must be greater than 0 when set");
        }

        let dialects = discovery
            .dialects
            .unwrap_or_else(|| DiscoveryOptions::default().dialects);
        if dialects.is_empty() {
            bail!("discovery.dialects must list at least one dialect");
        }
        let mut seen = HashSet::new();
        if let Some(dup) = dialects.iter().find(|d| !seen.insert(**d)) {
            bail!("discovery.dialects lists {dup} more than once");
        }

        Ok(ServiceConfiguration {
            metrics: EndpointSettings {
                target,
                scheme,
                api_key: metrics.api_key,
                api_secret: metrics.api_secret,
                request_timeout_ms,
                tls_config: metrics.tls_config,
            },
            discovery: DiscoverySettings {
                retry_interval_secs,
                revalidate_interval_secs: discovery.revalidate_interval_secs,
                dialects,
            },
        })
    }
}

impl ServiceConfiguration {
    /// Reads and validates the YAML config file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let load_config: LoadConfiguration = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        load_config.try_into()
    }

    pub(crate) fn endpoint(&self) -> EndpointConfig {
        let metrics = &self.metrics;
        let mut endpoint = EndpointConfig::new(metrics.target.clone())
            .with_timeout(Duration::from_millis(metrics.request_timeout_ms));
        endpoint.scheme = metrics.scheme;
        endpoint.api_key = metrics.api_key.clone();
        endpoint.api_secret = metrics.api_secret.clone();
        endpoint.tls = metrics.tls_config.as_ref().map(|tls| TlsOptions {
            ca_file: tls.ca_file.clone(),
            cert_file: tls.cert_file.clone(),
            key_file: tls.key_file.clone(),
            insecure_skip_verify: tls.insecure_skip_verify,
        });
        endpoint
    }

    pub(crate) fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            retry_interval: Duration::from_secs(self.discovery.retry_interval_secs),
            revalidate_interval: self
                .discovery
                .revalidate_interval_secs
                .map(Duration::from_secs),
            dialects: self.discovery.dialects.clone(),
        }
    }

    /// YAML rendering served on `/config`, with the API secret masked.
    pub(crate) fn to_redacted_yaml(&self) -> Result<String> {
        let mut redacted = self.clone();
        if redacted.metrics.api_secret.is_some() {
            redacted.metrics.api_secret = Some(REDACTED.to_string());
        }
        Ok(serde_yaml::to_string(&redacted)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<ServiceConfiguration> {
        let load: LoadConfiguration = serde_yaml::from_str(yaml)?;
        load.try_into()
    }

    #[test]
    fn test_full_configuration() {
        let config = parse(
            r#"
metrics:
  target: 127.0.0.1:18083
  api_key: some_api_key
  api_secret: some_api_secret
  scheme: HTTPS
  request_timeout_ms: 2500
  tls_config:
    ca_file: /etc/emqx/ca.pem
    insecure_skip_verify: true
discovery:
  retry_interval_secs: 10
  revalidate_interval_secs: 300
  dialects: [v5, v4]
"#,
        )
        .unwrap();

        let endpoint = config.endpoint();
        assert_eq!(endpoint.base_uri().unwrap(), "https://127.0.0.1:18083");
        assert_eq!(endpoint.request_timeout, Duration::from_millis(2500));
        assert_eq!(endpoint.api_key.as_deref(), Some("some_api_key"));
        let tls = endpoint.tls.unwrap();
        assert!(tls.insecure_skip_verify);
        assert_eq!(tls.ca_file, Some(PathBuf::from("/etc/emqx/ca.pem")));

        let options = config.discovery_options();
        assert_eq!(options.retry_interval, Duration::from_secs(10));
        assert_eq!(options.revalidate_interval, Some(Duration::from_secs(300)));
        assert_eq!(options.dialects, vec![Dialect::V5, Dialect::V4]);
    }

    #[test]
    fn test_defaults_apply() {
        let config = parse("metrics:\n  target: emqx:18083\n").unwrap();
        let endpoint = config.endpoint();
        assert_eq!(endpoint.scheme, Scheme::Http);
        assert_eq!(endpoint.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(endpoint.api_key.is_none());

        let options = config.discovery_options();
        assert_eq!(options.retry_interval, DEFAULT_RETRY_INTERVAL);
        assert!(options.revalidate_interval.is_none());
        assert_eq!(options.dialects, vec![Dialect::V4, Dialect::V5]);
    }

    #[test]
    fn test_invalid_configurations() {
        let cases = [
            ("metrics:\n  target: ''\n", "must not be empty"),
            ("metrics:\n  target: http://emqx:18083\n", "must not carry a scheme"),
            ("metrics:\n  target: emqx:18083\n  scheme: ftp\n", "invalid metrics.scheme"),
            ("metrics:\n  target: emqx:18083\n  request_timeout_ms: 0\n", "request_timeout_ms"),
            ("metrics:\n  target: emqx:18083\n  api_key: k\n", "set together"),
            (
                "metrics:\n  target: emqx:18083\n  tls_config:\n    key_file: /k.pem\n",
                "cert_file and tls_config.key_file",
            ),
            (
                "metrics:\n  target: emqx:18083\ndiscovery:\n  retry_interval_secs: 0\n",
                "retry_interval_secs",
            ),
            (
                "metrics:\n  target: emqx:18083\ndiscovery:\n  dialects: []\n",
                "at least one dialect",
            ),
            (
                "metrics:\n  target: emqx:18083\ndiscovery:\n  dialects: [v4, v4]\n",
                "more than once",
            ),
        ];

        for (yaml, expected) in cases {
            let err = parse(yaml).unwrap_err();
            assert!(
                format!("{err:#}").contains(expected),
                "{yaml:?}: expected {expected:?}, got {err:#}"
            );
        }
    }

    #[test]
    fn test_unknown_dialect_is_rejected_by_parser() {
        let err = serde_yaml::from_str::<LoadConfiguration>(
            "metrics:\n  target: emqx:18083\ndiscovery:\n  dialects: [v3]\n",
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_redacted_yaml_hides_secret() {
        let config = parse(
            "metrics:\n  target: emqx:18083\n  api_key: key\n  api_secret: hunter2\n",
        )
        .unwrap();
        let yaml = config.to_redacted_yaml().unwrap();
        assert!(!yaml.contains("hunter2"));
        assert!(yaml.contains("<secret>"));
        assert!(yaml.contains("scheme: http"));
        // the live configuration keeps the real secret
        assert_eq!(config.metrics.api_secret.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = ServiceConfiguration::load(Path::new("/nonexistent/emqx-exporter.yaml"))
            .unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
