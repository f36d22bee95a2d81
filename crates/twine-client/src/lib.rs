//! # JSON-RPC Client
//!
//! A proxy for calling JSON-RPC 2.0 methods over HTTP. Methods are addressed
//! by name with [`Proxy::method`], which dot-joins namespaces, and called with
//! positional arguments, named arguments or both.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde_json::json;
//! use twine_client::Proxy;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let proxy = Proxy::from_url("http://localhost:8007/jsonrpc")?;
//!
//!     let sum = proxy.method("add").call_args(vec![json!(1), json!(2)]).await?;
//!     println!("1 + 2 = {}", sum);
//!
//!     let outputs = proxy
//!         .batch_call(vec![
//!             ("add", (vec![json!(1), json!(2)], Default::default())),
//!             ("subtract", (vec![json!(2), json!(1)], Default::default())),
//!         ])
//!         .await?;
//!     println!("{:?}", outputs);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Hooks
//!
//! Implement [`ProxyEvents`] and install it with [`Proxy::customize`] to
//! rewrite arguments (an authentication token on every call, say) or inspect
//! responses before they are unwrapped.

pub mod config;
pub mod error;
pub mod events;
pub mod prelude;
pub mod proxy;
pub mod transport;

pub use config::{ClientConfig, TimeoutConfig};
pub use error::{ClientError, ClientResult, TransportError};
pub use events::{DefaultProxyEvents, IdGenerator, ProxyEvents};
pub use proxy::{BatchOutput, DEFAULT_PATH, Proxy};
pub use transport::{HttpPost, HttpTransport, TransportStatistics};

pub use twine_json_rpc::{ErrorKind, ErrorObject, RpcError};
