//! HTTP server for a JSON-RPC dispatcher
//!
//! One task per connection, HTTP/1.1 with keep-alive. Every request is
//! answered through [`RpcHttpHandler`].

use std::convert::Infallible;
use std::future::{Future, pending};
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use twine_json_rpc::{DefaultEvents, Dispatcher, ServerEvents};

use crate::handler::RpcHttpHandler;
use crate::{HttpServerError, Result};

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to; port 0 picks a free one
    pub bind_address: SocketAddr,
    /// Path of the RPC resource
    pub rpc_path: String,
    /// Maximum request body size
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8007)),
            rpc_path: "/jsonrpc".to_string(),
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Builder for [`HttpRpcServer`]
pub struct HttpRpcServerBuilder {
    config: ServerConfig,
    events: Option<Arc<dyn ServerEvents>>,
}

impl HttpRpcServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            events: None,
        }
    }

    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    /// Path of the RPC resource; a leading `/` is added when missing
    pub fn rpc_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.config.rpc_path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Hooks the dispatcher runs; [`DefaultEvents`] when never called
    pub fn events<E: ServerEvents>(self, events: E) -> Self {
        self.shared_events(Arc::new(events))
    }

    pub fn shared_events(mut self, events: Arc<dyn ServerEvents>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> HttpRpcServer {
        let events = self
            .events
            .unwrap_or_else(|| Arc::new(DefaultEvents) as Arc<dyn ServerEvents>);
        let handler = RpcHttpHandler::new(&self.config, Dispatcher::from_shared(events));
        HttpRpcServer {
            config: self.config,
            handler,
        }
    }
}

impl Default for HttpRpcServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP front for a [`Dispatcher`]
#[derive(Clone)]
pub struct HttpRpcServer {
    config: ServerConfig,
    handler: RpcHttpHandler,
}

impl HttpRpcServer {
    pub fn builder() -> HttpRpcServerBuilder {
        HttpRpcServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn handler(&self) -> &RpcHttpHandler {
        &self.handler
    }

    /// Bind the listening socket without serving yet
    pub async fn bind(&self) -> Result<BoundServer> {
        if self.config.max_body_size == 0 {
            return Err(HttpServerError::InvalidConfig(
                "max_body_size must be greater than zero".to_string(),
            ));
        }

        let listener = TcpListener::bind(&self.config.bind_address).await?;
        let local_addr = listener.local_addr()?;
        info!("JSON-RPC server listening on {}", local_addr);
        info!("RPC endpoint available at: {}", self.config.rpc_path);

        Ok(BoundServer {
            listener,
            local_addr,
            handler: self.handler.clone(),
        })
    }

    /// Bind and serve until the process ends
    pub async fn run(&self) -> Result<()> {
        self.bind().await?.serve().await
    }
}

/// A server whose socket is bound; serving starts with [`BoundServer::serve`]
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: RpcHttpHandler,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(pending()).await
    }

    /// Accept connections until `shutdown` resolves. Connections already
    /// accepted keep running on their own tasks.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                accepted = self.listener.accept() => accepted?,
                _ = &mut shutdown => {
                    info!("JSON-RPC server on {} shutting down", self.local_addr);
                    return Ok(());
                }
            };
            debug!("New connection from {}", peer_addr);

            let handler = self.handler.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(handler.handle(req, Some(peer_addr)).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    // Clients dropping keep-alive connections is not a problem
                    let err_str = err.to_string();
                    if err_str.contains("connection closed before message completed") {
                        debug!("Client disconnected (normal): {}", err);
                    } else {
                        error!("Error serving connection: {}", err);
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Empty, Full};
    use hyper::Request;
    use hyper::client::conn::http1 as client_http1;
    use serde_json::{Value, json};
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::net::TcpStream;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.rpc_path, "/jsonrpc");
        assert_eq!(config.bind_address.port(), 8007);
        assert_eq!(config.max_body_size, 1024 * 1024);
    }

    #[test]
    fn test_builder() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 3000);
        let server = HttpRpcServer::builder()
            .bind_address(addr)
            .rpc_path("api/rpc")
            .max_body_size(2048)
            .build();

        assert_eq!(server.config().bind_address, addr);
        assert_eq!(server.config().rpc_path, "/api/rpc");
        assert_eq!(server.config().max_body_size, 2048);
        assert!(server.handler().matches_path("/api/rpc/"));
    }

    #[tokio::test]
    async fn test_zero_body_limit_is_rejected() {
        let server = HttpRpcServer::builder().max_body_size(0).build();
        assert!(matches!(server.bind().await, Err(HttpServerError::InvalidConfig(_))));
    }

    async fn send<B>(addr: SocketAddr, request: Request<B>) -> (u16, Bytes)
    where
        B: hyper::body::Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (mut sender, connection) = client_http1::handshake(TokioIo::new(stream)).await.unwrap();
        tokio::spawn(connection);

        let response = sender.send_request(request).await.unwrap();
        let status = response.status().as_u16();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    #[tokio::test]
    async fn test_serves_over_tcp() {
        let server = HttpRpcServer::builder()
            .bind_address(SocketAddr::from(([127, 0, 0, 1], 0)))
            .build();
        let bound = server.bind().await.unwrap();
        let addr = bound.local_addr();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let serving = tokio::spawn(bound.serve_with_shutdown(async {
            let _ = stopped.await;
        }));

        let request = Request::post("/jsonrpc/")
            .header("host", addr.to_string())
            .body(Full::new(Bytes::from_static(
                br#"{"jsonrpc":"2.0","method":"anything","params":[],"id":"a"}"#,
            )))
            .unwrap();
        let (status, body) = send(addr, request).await;
        assert_eq!(status, 200);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({"jsonrpc": "2.0", "id": "a", "result": "Test Data"}));

        let request = Request::get("/favicon.ico")
            .header("host", addr.to_string())
            .body(Empty::<Bytes>::new())
            .unwrap();
        let (status, _) = send(addr, request).await;
        assert_eq!(status, 404);

        stop.send(()).unwrap();
        serving.await.unwrap().unwrap();
    }
}
