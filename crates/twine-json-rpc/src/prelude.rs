//! # JSON-RPC Prelude
//!
//! ```rust
//! use twine_json_rpc::prelude::*;
//! ```

pub use crate::codec::{CodecError, JsonEquivalent};
pub use crate::error::{ErrorKind, ErrorObject, MethodError, MethodFailure, RpcError};
pub use crate::request::{Incoming, Request};
pub use crate::response::{Reply, Response};
pub use crate::types::RequestId;

#[cfg(feature = "dispatch")]
pub use crate::dispatch::Dispatcher;
#[cfg(feature = "dispatch")]
pub use crate::events::{
    CallArgs, DefaultEvents, Method, MethodResult, RequestContext, ServerEvents, to_result,
    to_result_or_display,
};
#[cfg(feature = "dispatch")]
pub use crate::exchange::Exchange;

pub use crate::error_codes::*;
