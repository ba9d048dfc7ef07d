use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

use agentracer_types::Endpoint;

/// Upper bound on a single transmission attempt
pub const SEND_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ingestion API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Transmission exceeded {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Delivers one serialized payload to an ingestion endpoint
///
/// Implementations may fail freely; the dispatcher discards every error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, endpoint: Endpoint, body: Value) -> Result<(), TransportError>;
}

/// HTTP transport for the agentracer ingestion API
pub struct HttpTransport {
    client: Client,
    host: String,
    api_key: String,
}

impl HttpTransport {
    /// Create a new HTTP transport
    ///
    /// # Arguments
    /// * `api_key` - Tracker credential, sent as `x-api-key`
    /// * `host` - Ingestion host URL (e.g., "https://api.agentracer.dev")
    pub fn new(api_key: impl Into<String>, host: impl Into<String>) -> anyhow::Result<Self> {
        // Connections must not outlive the short-lived runtimes of the thread path.
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .pool_max_idle_per_host(0)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, endpoint: Endpoint, body: Value) -> Result<(), TransportError> {
        let response = self
            .client
            .post(endpoint.url(&self.host))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::trace!(target: "agentracer", %endpoint, %status, "telemetry delivered");
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read response body".to_string());
        Err(TransportError::Status { status, body })
    }
}

/// In-memory transport that keeps every payload it receives
///
/// Useful for asserting on emitted telemetry in application tests.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    sent: Arc<Mutex<Vec<(Endpoint, Value)>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything posted so far, in arrival order
    pub fn sent(&self) -> Vec<(Endpoint, Value)> {
        self.lock().clone()
    }

    /// Bodies posted to one endpoint, in arrival order
    pub fn bodies(&self, endpoint: Endpoint) -> Vec<Value> {
        self.lock()
            .iter()
            .filter(|(e, _)| *e == endpoint)
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `count` payloads arrived or `timeout` elapsed
    ///
    /// Returns whether the count was reached.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.len() >= count {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Blocking variant of [`MemoryTransport::wait_for`] for synchronous callers
    pub fn wait_for_blocking(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.len() >= count {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Endpoint, Value)>> {
        // A panicking test thread must not hide what was already captured.
        self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn post(&self, endpoint: Endpoint, body: Value) -> Result<(), TransportError> {
        self.lock().push((endpoint, body));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transport_creation() {
        let transport = HttpTransport::new("key-123", "https://api.agentracer.dev/");

        assert!(transport.is_ok());
        assert_eq!(transport.unwrap().host(), "https://api.agentracer.dev");
    }

    #[tokio::test]
    async fn test_memory_transport_filters_by_endpoint() {
        let transport = MemoryTransport::new();
        transport.post(Endpoint::Ingest, json!({ "n": 1 })).await.unwrap();
        transport.post(Endpoint::RunStart, json!({ "n": 2 })).await.unwrap();
        transport.post(Endpoint::Ingest, json!({ "n": 3 })).await.unwrap();

        assert_eq!(transport.len(), 3);
        assert_eq!(
            transport.bodies(Endpoint::Ingest),
            vec![json!({ "n": 1 }), json!({ "n": 3 })]
        );
        assert!(transport.wait_for(3, Duration::from_millis(10)).await);
        assert!(!transport.wait_for(4, Duration::from_millis(20)).await);
    }
}
