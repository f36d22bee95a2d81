use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use thiserror::Error;

use crate::error_codes;
use crate::registry;

/// Error raised by a method body. Anything that implements `std::error::Error`
/// converts into it with `?`; `RpcError` and `MethodFailure` are recognised
/// and keep their shape on the wire.
pub type MethodError = Box<dyn std::error::Error + Send + Sync>;

/// The family an error code belongs to.
///
/// Codes are mapped to kinds through the process-wide [`registry`], so a client
/// decoding a wire error gets the same kind the server raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Code 0 and every code nobody registered
    Generic,
    Parse,
    InvalidRequest,
    MethodNotFound,
    /// Added at runtime through [`registry::register_error_kind`]
    Custom { code: i64, name: &'static str },
}

impl ErrorKind {
    /// Message used when an error of this kind is raised without one
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::Parse => "Parse error.",
            ErrorKind::InvalidRequest => "Invalid Request.",
            ErrorKind::MethodNotFound => "Procedure not found.",
            ErrorKind::Generic | ErrorKind::Custom { .. } => "",
        }
    }

    /// Code this kind is registered under
    pub fn code(&self) -> i64 {
        match self {
            ErrorKind::Generic => error_codes::GENERIC,
            ErrorKind::Parse => error_codes::PARSE_ERROR,
            ErrorKind::InvalidRequest => error_codes::INVALID_REQUEST,
            ErrorKind::MethodNotFound => error_codes::METHOD_NOT_FOUND,
            ErrorKind::Custom { code, .. } => *code,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Generic => "RPCError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::InvalidRequest => "InvalidRequest",
            ErrorKind::MethodNotFound => "MethodNotFound",
            ErrorKind::Custom { name, .. } => name,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

/// JSON-RPC error object, exactly as it travels under the `error` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }
}

/// A typed JSON-RPC error.
///
/// Returned by method bodies to control the wire error precisely, produced by
/// the dispatcher for protocol failures, and rebuilt by clients from the wire
/// error object.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    kind: ErrorKind,
    object: ErrorObject,
}

impl RpcError {
    /// Build an error of a given kind with its default message
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            object: ErrorObject::new(kind.code(), kind.default_message(), None),
        }
    }

    pub fn parse_error() -> Self {
        Self::from_kind(ErrorKind::Parse)
    }

    pub fn invalid_request() -> Self {
        Self::from_kind(ErrorKind::InvalidRequest)
    }

    pub fn method_not_found() -> Self {
        Self::from_kind(ErrorKind::MethodNotFound)
    }

    /// Code 0 wrapper for failures that carry no JSON-RPC structure
    pub fn unstructured(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            kind: ErrorKind::Generic,
            object: ErrorObject::new(error_codes::GENERIC, message, data),
        }
    }

    /// Build an error with an arbitrary code; the kind comes from the registry
    pub fn new(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self::from_object(ErrorObject::new(code, message, data))
    }

    /// Rebuild a typed error from a wire error object
    pub fn from_object(object: ErrorObject) -> Self {
        Self {
            kind: registry::lookup(object.code),
            object,
        }
    }

    /// Convert whatever a method body failed with into a wire error.
    ///
    /// `RpcError` passes through untouched, `MethodFailure` keeps its argument
    /// list, anything else becomes code 0 with its display string as both
    /// message and sole argument.
    pub fn from_method_error(err: MethodError) -> Self {
        match err.downcast::<RpcError>() {
            Ok(rpc) => *rpc,
            Err(err) => match err.downcast::<MethodFailure>() {
                Ok(failure) => (*failure).into(),
                Err(other) => {
                    let message = other.to_string();
                    Self::unstructured(message.clone(), Some(json!([message])))
                }
            },
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.object.data = Some(data);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.object.message = message.into();
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> i64 {
        self.object.code
    }

    pub fn message(&self) -> &str {
        &self.object.message
    }

    pub fn data(&self) -> Option<&Value> {
        self.object.data.as_ref()
    }

    pub fn object(&self) -> &ErrorObject {
        &self.object
    }

    pub fn into_object(self) -> ErrorObject {
        self.object
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for RpcError {
    /// Errors print as their wire projection
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = serde_json::to_string(&self.object).map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

impl std::error::Error for RpcError {}

impl From<ErrorObject> for RpcError {
    fn from(object: ErrorObject) -> Self {
        Self::from_object(object)
    }
}

impl Serialize for RpcError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.object.serialize(serializer)
    }
}

/// An application failure with an explicit argument list.
///
/// Lands on the wire as a code 0 error whose `data` is `args`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct MethodFailure {
    pub message: String,
    pub args: Vec<Value>,
}

impl MethodFailure {
    /// A failure whose only argument is its message
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            args: vec![Value::String(message.clone())],
            message,
        }
    }

    pub fn with_args(message: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            message: message.into(),
            args,
        }
    }
}

impl From<MethodFailure> for RpcError {
    fn from(failure: MethodFailure) -> Self {
        RpcError::unstructured(failure.message, Some(Value::Array(failure.args)))
    }
}
