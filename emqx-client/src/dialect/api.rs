use crate::config::EndpointConfig;
use crate::errors::{ClientError, Result};

use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::trace;

/// Thin authenticated GET helper over the shared HTTP transport
#[derive(Clone, Debug)]
pub struct AdminApi {
    http: reqwest::Client,
    base_uri: String,
    api_key: Option<String>,
    api_secret: Option<String>,
}

impl AdminApi {
    pub fn new(endpoint: &EndpointConfig) -> Result<Self> {
        Ok(Self {
            http: endpoint.http_client()?,
            base_uri: endpoint.base_uri()?,
            api_key: endpoint.api_key.clone(),
            api_secret: endpoint.api_secret.clone(),
        })
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        match self.get_optional_json(path).await? {
            Some(value) => Ok(value),
            None => Err(ClientError::UnexpectedStatus {
                status: StatusCode::NOT_FOUND.as_u16(),
                url: self.url(path),
            }),
        }
    }

    /// Like `get_json`, but a 404 yields `Ok(None)` instead of an error.
    pub(crate) async fn get_optional_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>> {
        let url = self.url(path);
        let mut request = self.http.get(&url);
        if let Some(api_key) = &self.api_key {
            request = request.basic_auth(api_key, self.api_secret.as_deref());
        }

        let response = request.send().await?;
        let status = response.status();
        trace!(url = %url, status = status.as_u16(), "admin api response");

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| ClientError::Decode(format!("{url}: {e}")))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_uri, path)
    }
}

/// Joins `segments` into an absolute path, percent-encoding each one so that
/// user-chosen ids cannot escape their path segment.
pub(crate) fn segment_path(segments: &[&str]) -> Result<String> {
    let mut url = Url::parse("http://localhost")
        .map_err(|e| ClientError::InvalidEndpoint(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| ClientError::InvalidEndpoint("url cannot carry a path".to_string()))?
        .clear()
        .extend(segments);
    Ok(url.path().to_string())
}
