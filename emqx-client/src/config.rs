use crate::dialect::Dialect;
use crate::errors::{ClientError, Result};

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Transport scheme used to reach the admin API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

impl std::str::FromStr for Scheme {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(ClientError::InvalidEndpoint(format!(
                "unsupported scheme {other:?}, expected http or https"
            ))),
        }
    }
}

/// TLS material for the admin API connection
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    pub ca_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub insecure_skip_verify: bool,
}

/// Connection settings shared by every dialect probe
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// host:port of the broker dashboard listener
    pub target: String,
    pub scheme: Scheme,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub request_timeout: Duration,
    pub tls: Option<TlsOptions>,
}

impl EndpointConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            scheme: Scheme::Http,
            api_key: None,
            api_secret: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            tls: None,
        }
    }

    pub fn with_credentials(mut self, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self.api_secret = Some(api_secret.into());
        self
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Base URI without trailing slash, e.g. `http://127.0.0.1:18083`
    pub fn base_uri(&self) -> Result<String> {
        let target = self.target.trim().trim_end_matches('/');
        if target.is_empty() {
            return Err(ClientError::InvalidEndpoint("empty target".to_string()));
        }
        if target.contains("://") {
            return Err(ClientError::InvalidEndpoint(format!(
                "target {target:?} must not carry a scheme, use the scheme setting"
            )));
        }
        Ok(format!("{}://{}", self.scheme, target))
    }

    /// Builds the HTTP transport reused by all dialect clients.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().timeout(self.request_timeout);

        if let Some(tls) = &self.tls {
            if let Some(ca_file) = &tls.ca_file {
                let pem = std::fs::read(ca_file)?;
                builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
            }
            match (&tls.cert_file, &tls.key_file) {
                (Some(cert_file), Some(key_file)) => {
                    let mut pem = std::fs::read(cert_file)?;
                    pem.extend_from_slice(&std::fs::read(key_file)?);
                    builder = builder.identity(reqwest::Identity::from_pem(&pem)?);
                }
                (None, None) => {}
                _ => {
                    return Err(ClientError::InvalidEndpoint(
                        "cert_file and key_file must be provided together".to_string(),
                    ))
                }
            }
            builder = builder.danger_accept_invalid_certs(tls.insecure_skip_verify);
        }

        Ok(builder.build()?)
    }
}

/// How the discovery loop probes and (optionally) re-validates the binding
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Pause between two failed probe cycles
    pub retry_interval: Duration,
    /// When set, re-run the probe sequence after binding and rebind on change
    pub revalidate_interval: Option<Duration>,
    /// Probe order, first compatible dialect wins
    pub dialects: Vec<Dialect>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            revalidate_interval: None,
            dialects: vec![Dialect::V4, Dialect::V5],
        }
    }
}
