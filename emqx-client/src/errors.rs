use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("api error code {code}: {message}")]
    Api { code: i64, message: String },

    #[error("unable to decode response: {0}")]
    Decode(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("unable to load the certificate: {0}")]
    IoError(#[from] std::io::Error),

    #[error("collect {category} failed: {source}")]
    Collect {
        category: &'static str,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// Wraps a delegated failure with the metric category it was collecting.
    pub(crate) fn collect(category: &'static str, source: ClientError) -> Self {
        ClientError::Collect {
            category,
            source: Box::new(source),
        }
    }

    /// Returns the HTTP status code when the broker answered with a non-2xx.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::UnexpectedStatus { status, .. } => Some(*status),
            ClientError::Collect { source, .. } => source.status_code(),
            _ => None,
        }
    }
}
