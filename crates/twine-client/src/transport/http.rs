//! reqwest-backed HTTP transport

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, TransportError};
use crate::transport::{HttpPost, TransportStatistics};

/// HTTP transport with an optional cookie jar shared by every proxy that
/// holds a clone of it
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    stats: Arc<Mutex<TransportStatistics>>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.timeouts.connect)
            .timeout(config.timeouts.request)
            .cookie_store(config.cookie_store);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        if let Some(headers) = &config.headers {
            builder = builder.default_headers(header_map(headers)?);
        }

        let client = builder
            .build()
            .map_err(|e| ClientError::config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(client))
    }

    /// Create HTTP transport with custom client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            stats: Arc::new(Mutex::new(TransportStatistics::default())),
        }
    }

    pub fn statistics(&self) -> TransportStatistics {
        self.stats.lock().clone()
    }

    fn record_error(&self, error: &TransportError) {
        let mut stats = self.stats.lock();
        stats.errors += 1;
        stats.last_error = Some(error.to_string());
    }

    async fn exchange(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(bytes.to_vec())
    }
}

fn header_map(headers: &std::collections::HashMap<String, String>) -> ClientResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ClientError::config(format!("Invalid header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ClientError::config(format!("Invalid value for header {}: {}", name, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl HttpPost for HttpTransport {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        debug!(url, bytes = body.len(), "Sending HTTP request");
        self.stats.lock().requests_sent += 1;

        match self.exchange(url, body).await {
            Ok(reply) => {
                self.stats.lock().responses_received += 1;
                debug!(url, bytes = reply.len(), "Received HTTP response");
                Ok(reply)
            }
            Err(err) => {
                warn!(url, error = %err, "HTTP request failed");
                self.record_error(&err);
                Err(err)
            }
        }
    }
}
