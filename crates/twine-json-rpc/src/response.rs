use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::JSONRPC_VERSION;
use crate::codec::{self, CodecError, JsonEquivalent};
use crate::error::{ErrorObject, RpcError};
use crate::types::{RequestId, id_to_value};

/// A JSON-RPC response.
///
/// On the wire exactly one of `result` and `error` is present; when there is
/// no error the result is sent, null if the method returned nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub version: String,
    pub id: Option<RequestId>,
    pub result: Value,
    pub error: Option<ErrorObject>,
}

impl Response {
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            version: JSONRPC_VERSION.to_string(),
            id,
            result,
            error: None,
        }
    }

    pub fn failure(id: Option<RequestId>, error: RpcError) -> Self {
        Self {
            version: JSONRPC_VERSION.to_string(),
            id,
            result: Value::Null,
            error: Some(error.into_object()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Rebuild a response from a decoded reply object
    pub fn from_value(value: Value) -> codec::Result<Self> {
        let mut content = into_object(value)?;

        let version = match content.remove("jsonrpc") {
            Some(Value::String(version)) => version,
            _ => JSONRPC_VERSION.to_string(),
        };

        let id = match content.remove("id") {
            Some(id) => RequestId::from_wire(id)
                .map_err(|bad| CodecError::Shape(format!("response id {} is not usable", bad)))?,
            None => return Err(CodecError::Shape("response has no id".to_string())),
        };

        let error = match content.remove("error") {
            None | Some(Value::Null) => None,
            Some(error) => Some(
                serde_json::from_value::<ErrorObject>(error)
                    .map_err(|e| CodecError::Shape(format!("malformed error object: {}", e)))?,
            ),
        };

        Ok(Self {
            version,
            id,
            result: content.remove("result").unwrap_or(Value::Null),
            error,
        })
    }

    /// The result, or the error rebuilt as the kind registered for its code
    pub fn get_result(self) -> Result<Value, RpcError> {
        match self.error {
            Some(error) => Err(RpcError::from_object(error)),
            None => Ok(self.result),
        }
    }

    /// `(result, error)`; exactly one side is populated
    pub fn get_output(self) -> (Option<Value>, Option<ErrorObject>) {
        match self.error {
            Some(error) => (None, Some(error)),
            None => (Some(self.result), None),
        }
    }
}

fn into_object(value: Value) -> codec::Result<Map<String, Value>> {
    match value {
        Value::Object(content) => Ok(content),
        other => Err(CodecError::Shape(format!(
            "expected a response object, got {}",
            other
        ))),
    }
}

impl JsonEquivalent for Response {
    fn json_equivalent(&self) -> codec::Result<Value> {
        let mut wire = Map::new();
        wire.insert("jsonrpc".to_string(), Value::String(self.version.clone()));
        wire.insert("id".to_string(), id_to_value(self.id.as_ref()));
        match &self.error {
            None => {
                wire.insert("result".to_string(), self.result.clone());
            }
            Some(error) => {
                wire.insert("error".to_string(), codec::to_json(error)?);
            }
        }
        Ok(Value::Object(wire))
    }
}

impl Serialize for Response {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.json_equivalent()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

/// What the server writes back: a single response object, or an array when
/// the request was a batch
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Single(Response),
    Batch(Vec<Response>),
}

impl Reply {
    /// Decode a reply body; an array becomes `Batch` even if it has one element
    pub fn from_value(value: Value) -> codec::Result<Self> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(Response::from_value)
                .collect::<codec::Result<Vec<_>>>()
                .map(Reply::Batch),
            other => Response::from_value(other).map(Reply::Single),
        }
    }

    pub fn responses(&self) -> &[Response] {
        match self {
            Reply::Single(response) => std::slice::from_ref(response),
            Reply::Batch(responses) => responses,
        }
    }

    pub fn into_responses(self) -> Vec<Response> {
        match self {
            Reply::Single(response) => vec![response],
            Reply::Batch(responses) => responses,
        }
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Single(response)
    }
}

impl JsonEquivalent for Reply {
    fn json_equivalent(&self) -> codec::Result<Value> {
        match self {
            Reply::Single(response) => response.json_equivalent(),
            Reply::Batch(responses) => responses
                .iter()
                .map(JsonEquivalent::json_equivalent)
                .collect::<codec::Result<Vec<_>>>()
                .map(Value::Array),
        }
    }
}

impl Serialize for Reply {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.json_equivalent()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_success_projection_has_only_result() {
        let response = Response::success(Some(RequestId::Number(1)), json!({"answer": 42}));
        assert_eq!(
            response.json_equivalent().unwrap(),
            json!({"jsonrpc": "2.0", "id": 1, "result": {"answer": 42}})
        );
    }

    #[test]
    fn test_null_result_is_still_sent() {
        let response = Response::success(Some(RequestId::from("test")), Value::Null);
        let wire = response.json_equivalent().unwrap();
        assert_eq!(wire.get("result"), Some(&Value::Null));
        assert!(wire.get("error").is_none());
    }

    #[test]
    fn test_error_projection_has_only_error() {
        let response = Response::failure(None, RpcError::parse_error());
        let encoded = codec::encode(&response).unwrap();
        assert_eq!(
            codec::decode(encoded.as_bytes()).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "id": null,
                "error": {"code": -32700, "message": "Parse error."}
            })
        );
    }

    #[test]
    fn test_get_result_raises_registered_kind() {
        let response = Response::from_value(json!({
            "jsonrpc": "2.0",
            "id": "x",
            "error": {"code": -32601, "message": "Procedure not found."}
        }))
        .unwrap();

        let error = response.get_result().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MethodNotFound);
        assert_eq!(error.message(), "Procedure not found.");
    }

    #[test]
    fn test_get_output_pairs() {
        let ok = Response::success(Some(RequestId::Number(1)), json!(3));
        assert_eq!(ok.get_output(), (Some(json!(3)), None));

        let failed = Response::failure(
            Some(RequestId::Number(2)),
            RpcError::unstructured("boom", None),
        );
        let (result, error) = failed.get_output();
        assert!(result.is_none());
        assert_eq!(error.unwrap().message, "boom");
    }

    #[test]
    fn test_response_reencoding_is_idempotent() {
        let wire = json!({
            "jsonrpc": "2.0", "id": 9,
            "error": {"code": 0, "message": "bad", "data": ["bad"]}
        });
        let response = Response::from_value(wire.clone()).unwrap();
        assert_eq!(response.json_equivalent().unwrap(), wire);
    }

    #[test]
    fn test_from_value_requires_object_with_id() {
        assert!(matches!(Response::from_value(json!([1])), Err(CodecError::Shape(_))));
        assert!(matches!(
            Response::from_value(json!({"jsonrpc": "2.0", "result": 1})),
            Err(CodecError::Shape(_))
        ));
    }

    #[test]
    fn test_reply_shapes() {
        let batch = Reply::from_value(json!([
            {"jsonrpc": "2.0", "id": 1, "result": 3},
            {"jsonrpc": "2.0", "id": 2, "result": 1}
        ]))
        .unwrap();
        assert_eq!(batch.responses().len(), 2);
        assert!(matches!(batch, Reply::Batch(_)));

        let single = Reply::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": 3})).unwrap();
        assert!(matches!(single, Reply::Single(_)));
        assert_eq!(codec::to_json(&single).unwrap()["result"], json!(3));
    }
}
