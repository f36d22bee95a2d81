//! # JSON-RPC 2.0 Core
//!
//! Message model, error kinds, JSON codec and the transport-agnostic server
//! dispatcher shared by the twine HTTP server and client.
//!
//! ## Features
//! - `dispatch` (default): the [`ServerEvents`] hook pipeline and the
//!   [`Dispatcher`] that drives it over any [`Exchange`]
//!
//! Positional and named arguments may be mixed in one call: named params carry
//! the positional ones under the reserved `"__args"` key.

pub mod codec;
pub mod error;
pub mod prelude;
pub mod registry;
pub mod request;
pub mod response;
pub mod types;

#[cfg(feature = "dispatch")]
pub mod dispatch;
#[cfg(feature = "dispatch")]
pub mod events;
#[cfg(feature = "dispatch")]
pub mod exchange;

pub use codec::{CodecError, JsonEquivalent};
pub use error::{ErrorKind, ErrorObject, MethodError, MethodFailure, RpcError};
pub use registry::{RegistryError, register_error_kind};
pub use request::{Incoming, Request, RequestDefect};
pub use response::{Reply, Response};
pub use types::RequestId;

#[cfg(feature = "dispatch")]
pub use dispatch::{Dispatcher, Rejection};
#[cfg(feature = "dispatch")]
pub use events::{
    CallArgs, DefaultEvents, LogRecord, Method, MethodResult, RequestContext, ServerEvents,
    to_result, to_result_or_display,
};
#[cfg(feature = "dispatch")]
pub use exchange::{BufferedExchange, Exchange, ExchangeError};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Key under which named params carry positional arguments
pub const RESERVED_ARGS_KEY: &str = "__args";

/// Error codes with a built-in kind
pub mod error_codes {
    /// Application failure without a more specific kind
    pub const GENERIC: i64 = 0;
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
}
