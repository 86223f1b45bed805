//! Lookup API transport
//!
//! The fetcher only needs "GET this URL and give me the body of a 200".
//! [`HttpTransport`] does that over reqwest; tests substitute their own
//! [`LookupTransport`].

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("feedfetch/", env!("CARGO_PKG_VERSION"));

/// Lookup transport errors
///
/// `Network` and `Status` are transient and the batch is retried.
/// `Body` means the response could not be read and the batch is abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Unreadable body (status {status}): {message}")]
    Body { status: u16, message: String },
}

impl TransportError {
    /// HTTP status, when a response was received at all
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Network(_) => None,
            TransportError::Status(status) => Some(*status),
            TransportError::Body { status, .. } => Some(*status),
        }
    }
}

/// Performs one lookup request
#[async_trait]
pub trait LookupTransport: Send + Sync {
    /// GET `url` and return the body of a 200 response
    ///
    /// # Returns
    /// * `Ok(body)` - status 200 and the body was read
    /// * `Err(Network | Status)` - connection failure or non-200 status
    /// * `Err(Body)` - status 200 but the body could not be read
    async fn get(&self, url: &str) -> Result<String, TransportError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl LookupTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String, TransportError> {
        tracing::debug!(url = %url, "Querying lookup API");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(TransportError::Status(status));
        }

        response.text().await.map_err(|e| TransportError::Body {
            status,
            message: e.to_string(),
        })
    }
}
