//! # Twine HTTP server
//!
//! Serves a [`twine_json_rpc::Dispatcher`] over HTTP/1.1 with hyper.
//!
//! Every request to the configured path, whatever its HTTP method, is handed
//! to the dispatcher's render cycle; other paths get a plain 404 and bodies
//! over the configured limit a plain 413.
//!
//! ```rust,no_run
//! # async fn demo() -> twine_http_server::Result<()> {
//! use twine_http_server::HttpRpcServer;
//! use twine_json_rpc::DefaultEvents;
//!
//! let server = HttpRpcServer::builder()
//!     .rpc_path("/jsonrpc")
//!     .events(DefaultEvents)
//!     .build();
//! server.run().await
//! # }
//! ```

pub mod exchange;
pub mod handler;
pub mod server;

pub use exchange::HyperExchange;
pub use handler::RpcHttpHandler;
pub use server::{BoundServer, HttpRpcServer, HttpRpcServerBuilder, ServerConfig};

/// Result type for HTTP server operations
pub type Result<T> = std::result::Result<T, HttpServerError>;

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
