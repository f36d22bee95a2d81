//! Convenient re-exports for client users
//!
//! ```rust
//! use twine_client::prelude::*;
//! ```

pub use crate::config::ClientConfig;
pub use crate::error::{ClientError, ClientResult};
pub use crate::events::ProxyEvents;
pub use crate::proxy::Proxy;
pub use crate::transport::{HttpPost, HttpTransport};

pub use twine_json_rpc::{ErrorKind, RpcError};
