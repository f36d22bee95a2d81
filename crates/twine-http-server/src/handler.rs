//! HTTP request handler: routing, body limits and the render cycle

use std::net::SocketAddr;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::CONTENT_LENGTH;
use hyper::{Request, Response, StatusCode};
use serde_json::Map;
use tracing::{debug, warn};
use twine_json_rpc::Dispatcher;

use crate::exchange::HyperExchange;
use crate::server::ServerConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Hands requests for the RPC path to a [`Dispatcher`]
#[derive(Clone)]
pub struct RpcHttpHandler {
    rpc_path: String,
    max_body_size: usize,
    dispatcher: Dispatcher,
}

impl RpcHttpHandler {
    pub fn new(config: &ServerConfig, dispatcher: Dispatcher) -> Self {
        Self {
            rpc_path: config.rpc_path.clone(),
            max_body_size: config.max_body_size,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Whether `path` addresses the RPC resource; a trailing slash is ignored
    pub fn matches_path(&self, path: &str) -> bool {
        path.trim_end_matches('/') == self.rpc_path.trim_end_matches('/')
    }

    pub async fn handle<B>(
        &self,
        req: Request<B>,
        peer: Option<SocketAddr>,
    ) -> Response<Full<Bytes>>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        debug!(method = %parts.method, path = %parts.uri.path(), "handling request");

        if !self.matches_path(parts.uri.path()) {
            return plain(StatusCode::NOT_FOUND, "Not Found");
        }

        let declared = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok());
        if declared.is_some_and(|length| length > self.max_body_size) {
            warn!(limit = self.max_body_size, ?declared, "request body too large");
            return plain(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
        }

        let body = match Limited::new(body, self.max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                warn!(limit = self.max_body_size, "request body too large");
                return plain(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
            }
            Err(err) => {
                warn!(error = %err, "failed to read request body");
                return plain(StatusCode::BAD_REQUEST, "Bad Request");
            }
        };

        let mut exchange = HyperExchange::new(&parts, body, peer);
        self.dispatcher.render(&mut exchange, Map::new()).await;
        exchange.into_response()
    }
}

fn plain(status: StatusCode, text: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(text.as_bytes())));
    *response.status_mut() = status;
    response
}
