//! Thin HTTP seam used by the acquirer.
//!
//! Retry and backoff live in [`crate::retry`]; a transport only performs one
//! GET and reports what came back.

use async_trait::async_trait;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Connect, timeout, or body-read failure. Always retryable.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform a single GET request.
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl HttpTransport for reqwest::Client {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let response = reqwest::Client::get(self, url)
            .send()
            .await
            .map_err(|e| TransportError(format!("{url}: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError(format!("{url}: failed to read body: {e}")))?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}
