use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::codec::{self, CodecError, JsonEquivalent};
use crate::error::RpcError;
use crate::types::{RequestId, id_to_value};
use crate::{JSONRPC_VERSION, RESERVED_ARGS_KEY};

/// What made an incoming request invalid. Recorded while decoding, reported by
/// [`Request::check`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestDefect {
    #[error("request is not a JSON object: {0}")]
    NotAnObject(Value),

    #[error("unsupported JSON-RPC version: {0}")]
    Version(Value),

    #[error("method must be a string, got {0}")]
    Method(Value),

    #[error("id must be a string, an integer or null, got {0}")]
    Id(Value),

    #[error("params must be an array or an object, got {0}")]
    Params(Value),

    #[error("positional arguments under \"__args\" must be an array, got {0}")]
    PositionalArgs(Value),
}

/// A JSON-RPC request.
///
/// `params` is split into positional `args` and named `kwargs`; an object
/// params may carry positional arguments alongside named ones under the
/// reserved `__args` key. Non-standard top-level keys are kept in `extra`.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub version: String,
    pub id: Option<RequestId>,
    pub method: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
    pub extra: Map<String, Value>,
    defect: Option<RequestDefect>,
}

impl Request {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>) -> Self {
        Self::build(Some(id.into()), method.into())
    }

    /// A request without an id; the server sends nothing back for it
    pub fn notification(method: impl Into<String>) -> Self {
        Self::build(None, method.into())
    }

    fn build(id: Option<RequestId>, method: String) -> Self {
        Self {
            version: JSONRPC_VERSION.to_string(),
            id,
            method,
            args: Vec::new(),
            kwargs: Map::new(),
            extra: Map::new(),
            defect: None,
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Build a request from a decoded JSON value.
    ///
    /// Never fails: whatever is wrong with the value is remembered and reported
    /// by [`Request::check`], so the caller can still answer with the id.
    pub fn from_value(value: Value) -> Self {
        let mut content = match value {
            Value::Object(content) => content,
            other => {
                let mut request = Self::build(None, String::new());
                request.defect = Some(RequestDefect::NotAnObject(other));
                return request;
            }
        };

        let mut defects = Vec::new();

        let version = match content.remove("jsonrpc") {
            Some(Value::String(version)) => {
                if version != JSONRPC_VERSION {
                    defects.push(RequestDefect::Version(Value::String(version.clone())));
                }
                version
            }
            other => {
                let other = other.unwrap_or(Value::Null);
                defects.push(RequestDefect::Version(other.clone()));
                other.to_string()
            }
        };

        let method = match content.remove("method") {
            Some(Value::String(method)) => method,
            other => {
                defects.push(RequestDefect::Method(other.unwrap_or(Value::Null)));
                String::new()
            }
        };

        let id = match RequestId::from_wire(content.remove("id").unwrap_or(Value::Null)) {
            Ok(id) => id,
            Err(malformed) => {
                defects.push(RequestDefect::Id(malformed));
                None
            }
        };

        let (args, kwargs) = match content.remove("params") {
            None | Some(Value::Null) => (Vec::new(), Map::new()),
            Some(Value::Array(args)) => (args, Map::new()),
            Some(Value::Object(mut kwargs)) => {
                let args = match kwargs.remove(RESERVED_ARGS_KEY) {
                    None => Vec::new(),
                    Some(Value::Array(args)) => args,
                    Some(other) => {
                        defects.push(RequestDefect::PositionalArgs(other));
                        Vec::new()
                    }
                };
                (args, kwargs)
            }
            Some(other) => {
                defects.push(RequestDefect::Params(other));
                (Vec::new(), Map::new())
            }
        };

        Self {
            version,
            id,
            method,
            args,
            kwargs,
            extra: content,
            defect: defects.into_iter().next(),
        }
    }

    /// Reject requests with a wrong version, a non-string method, a malformed
    /// id or malformed params
    pub fn check(&self) -> Result<(), RpcError> {
        match &self.defect {
            None => Ok(()),
            Some(defect) => {
                tracing::debug!(%defect, id = ?self.id, "rejecting invalid request");
                Err(RpcError::invalid_request())
            }
        }
    }

    pub fn defect(&self) -> Option<&RequestDefect> {
        self.defect.as_ref()
    }
}

impl JsonEquivalent for Request {
    fn json_equivalent(&self) -> codec::Result<Value> {
        if self.kwargs.contains_key(RESERVED_ARGS_KEY) {
            return Err(CodecError::Projection(format!(
                "invalid argument name: {}",
                RESERVED_ARGS_KEY
            )));
        }

        let params = if self.kwargs.is_empty() {
            Value::Array(self.args.clone())
        } else {
            let mut kwargs = self.kwargs.clone();
            if !self.args.is_empty() {
                kwargs.insert(RESERVED_ARGS_KEY.to_string(), Value::Array(self.args.clone()));
            }
            Value::Object(kwargs)
        };

        let mut wire = self.extra.clone();
        wire.insert("jsonrpc".to_string(), Value::String(self.version.clone()));
        wire.insert("id".to_string(), id_to_value(self.id.as_ref()));
        wire.insert("method".to_string(), Value::String(self.method.clone()));
        wire.insert("params".to_string(), params);
        Ok(Value::Object(wire))
    }
}

impl Serialize for Request {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.json_equivalent()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

/// A decoded request payload: one request object or a batch array
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Single(Request),
    Batch(Vec<Request>),
}

impl Incoming {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => {
                Incoming::Batch(items.into_iter().map(Request::from_value).collect())
            }
            other => Incoming::Single(Request::from_value(other)),
        }
    }

    /// Parse raw JSON text; fails only when the text is not JSON at all
    pub fn decode(text: &[u8]) -> codec::Result<Self> {
        codec::decode(text).map(Self::from_value)
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Incoming::Batch(_))
    }

    pub fn into_requests(self) -> Vec<Request> {
        match self {
            Incoming::Single(request) => vec![request],
            Incoming::Batch(requests) => requests,
        }
    }
}
