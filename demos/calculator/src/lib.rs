//! # Calculator
//!
//! Server hooks exposing `add(a, b)` and `subtract(a, b)`. Operands may be
//! passed by position or by name; integers stay integers.

use serde_json::{Map, Number, Value};
use tracing::{info, warn};
use twine_json_rpc::{
    CallArgs, LogRecord, Method, MethodFailure, MethodResult, RequestContext, ServerEvents,
    to_result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Subtract,
}

impl Op {
    fn apply(self, call: CallArgs) -> MethodResult {
        let a: Number = call.arg(0, "a")?;
        let b: Number = call.arg(1, "b")?;

        if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
            let value = match self {
                Op::Add => a.checked_add(b),
                Op::Subtract => a.checked_sub(b),
            };
            return match value {
                Some(value) => to_result(&value),
                None => Err(MethodFailure::with_args(
                    "integer overflow",
                    vec![Value::from(a), Value::from(b)],
                )
                .into()),
            };
        }

        let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
        let value = match self {
            Op::Add => a + b,
            Op::Subtract => a - b,
        };
        to_result(&value)
    }
}

/// Resolves the calculator's methods and traces every render cycle
#[derive(Debug, Clone, Default)]
pub struct Calculator;

impl ServerEvents for Calculator {
    fn find_method(&self, name: &str, _: &[Value], _: &Map<String, Value>) -> Option<Method> {
        let op = match name {
            "add" => Op::Add,
            "subtract" => Op::Subtract,
            _ => return None,
        };
        Some(Method::blocking(move |call| op.apply(call)))
    }

    fn log(&self, record: &LogRecord<'_>, ctx: &RequestContext, error: bool) {
        let peer = ctx.peer.map(|peer| peer.to_string()).unwrap_or_default();
        match record {
            LogRecord::Reply(Some(reply)) => {
                let failed = reply.responses().iter().filter(|r| r.is_error()).count();
                info!(%peer, responses = reply.responses().len(), failed, "request served");
            }
            LogRecord::Reply(None) => info!(%peer, "notifications served"),
            LogRecord::Failure(rejected) => {
                warn!(
                    %peer,
                    error,
                    code = rejected.code(),
                    message = rejected.message(),
                    "request rejected"
                )
            }
        }
    }
}
