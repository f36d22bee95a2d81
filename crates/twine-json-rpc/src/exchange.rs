//! The transport side of one render cycle.
//!
//! A transport adapter (the HTTP server, a test harness) wraps its request and
//! response objects in an [`Exchange`] and hands it to
//! [`Dispatcher::render`](crate::dispatch::Dispatcher::render).

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::codec;
use crate::events::RequestContext;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("failed to read request body: {0}")]
    Read(String),
}

/// One request/response pair as seen by the dispatcher
#[async_trait]
pub trait Exchange: Send {
    /// Snapshot of the request handed to every hook
    fn context(&self) -> RequestContext;

    /// The full request body. Called at most once.
    async fn read_body(&mut self) -> Result<Vec<u8>, ExchangeError>;

    fn set_status(&mut self, code: u16);

    fn set_header(&mut self, name: &str, value: &str);

    fn write(&mut self, body: &[u8]);

    /// Signal that nothing more will be written
    fn finish(&mut self);
}

/// An exchange held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct BufferedExchange {
    context: RequestContext,
    body: Vec<u8>,
    status: Option<u16>,
    headers: Vec<(String, String)>,
    written: Vec<u8>,
    finished: bool,
}

impl BufferedExchange {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            context: RequestContext {
                method: "POST".to_string(),
                path: "/".to_string(),
                ..Default::default()
            },
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// What was written, decoded; `None` when nothing was
    pub fn written_json(&self) -> Option<Value> {
        if self.written.is_empty() {
            return None;
        }
        codec::decode(&self.written).ok()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[async_trait]
impl Exchange for BufferedExchange {
    fn context(&self) -> RequestContext {
        self.context.clone()
    }

    async fn read_body(&mut self) -> Result<Vec<u8>, ExchangeError> {
        Ok(std::mem::take(&mut self.body))
    }

    fn set_status(&mut self, code: u16) {
        self.status = Some(code);
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn write(&mut self, body: &[u8]) {
        self.written.extend_from_slice(body);
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}
