use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A uniquely identifying ID for a JSON-RPC request.
/// Can be a string or an integer. A request without one is a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl RequestId {
    /// Interpret a raw wire value as an id.
    ///
    /// `Ok(None)` means the value was null (a notification). Any value that is
    /// neither a string, an integer nor null is handed back unchanged as `Err`.
    pub fn from_wire(value: Value) -> Result<Option<Self>, Value> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(RequestId::String(s))),
            Value::Number(n) => match n.as_i64() {
                Some(n) => Ok(Some(RequestId::Number(n))),
                None => Err(Value::Number(n)),
            },
            other => Err(other),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RequestId::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RequestId::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RequestId::String(s) => Value::String(s.clone()),
            RequestId::Number(n) => Value::from(*n),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{}", s),
            RequestId::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

/// Render an optional id the way it appears on the wire.
pub(crate) fn id_to_value(id: Option<&RequestId>) -> Value {
    id.map(RequestId::to_value).unwrap_or(Value::Null)
}
