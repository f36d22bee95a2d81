//! Transport layer for the client proxy
//!
//! The proxy only ever POSTs one body and reads one body back; cookies,
//! sessions and timeouts are the transport's business.

use async_trait::async_trait;

use crate::error::TransportError;

pub mod http;

pub use http::HttpTransport;

/// POST a request body to a URL and return the reply body
#[async_trait]
pub trait HttpPost: Send + Sync {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, TransportError>;
}

/// Counters kept by a transport
#[derive(Debug, Clone, Default)]
pub struct TransportStatistics {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub errors: u64,
    pub last_error: Option<String>,
}
