//! Adapts one hyper request/response pair to the dispatcher's [`Exchange`].

use std::collections::HashMap;
use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use hyper::Response;
use tracing::warn;
use twine_json_rpc::{Exchange, ExchangeError, RequestContext};

/// A request whose body has already been collected, plus the response being
/// built for it
#[derive(Debug)]
pub struct HyperExchange {
    context: RequestContext,
    body: Option<Bytes>,
    status: StatusCode,
    headers: HeaderMap,
    written: Vec<u8>,
    finished: bool,
}

impl HyperExchange {
    pub fn new(parts: &Parts, body: Bytes, peer: Option<SocketAddr>) -> Self {
        Self {
            context: request_context(parts, peer),
            body: Some(body),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            written: Vec::new(),
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(self.written)));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[async_trait]
impl Exchange for HyperExchange {
    fn context(&self) -> RequestContext {
        self.context.clone()
    }

    async fn read_body(&mut self) -> Result<Vec<u8>, ExchangeError> {
        self.body
            .take()
            .map(|body| body.to_vec())
            .ok_or_else(|| ExchangeError::Read("body already consumed".to_string()))
    }

    fn set_status(&mut self, code: u16) {
        match StatusCode::from_u16(code) {
            Ok(status) => self.status = status,
            Err(_) => {
                warn!(code, "ignoring invalid status code");
                self.status = StatusCode::INTERNAL_SERVER_ERROR;
            }
        }
    }

    fn set_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!(header = %name, "ignoring invalid response header"),
        }
    }

    fn write(&mut self, body: &[u8]) {
        self.written.extend_from_slice(body);
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

/// Snapshot of the parts hooks get to see. Repeated headers are joined, with
/// `; ` for cookies and `, ` for everything else.
fn request_context(parts: &Parts, peer: Option<SocketAddr>) -> RequestContext {
    let mut headers: HashMap<String, String> = HashMap::new();
    for (name, value) in &parts.headers {
        let Ok(value) = value.to_str() else {
            warn!(header = %name, "skipping header that is not visible ASCII");
            continue;
        };
        let separator = if *name == http::header::COOKIE { "; " } else { ", " };
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(separator);
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    RequestContext {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers,
        peer,
    }
}
