//! Server hook pipeline.
//!
//! [`ServerEvents`] is the strategy the [`Dispatcher`](crate::dispatch::Dispatcher)
//! is built with. Every hook has a permissive default, so an implementation
//! usually overrides `find_method` and little else.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::task::JoinError;

use crate::codec;
use crate::error::{MethodError, MethodFailure, RpcError};
use crate::request::Request;
use crate::response::{Reply, Response};

/// Outcome of a method body
pub type MethodResult = Result<Value, MethodError>;

/// Serialize a method's return value into its JSON result
pub fn to_result<T: Serialize + ?Sized>(value: &T) -> MethodResult {
    Ok(codec::to_json(value)?)
}

/// Like [`to_result`], but a value serde cannot represent becomes its
/// display string instead of a method failure
pub fn to_result_or_display<T: Serialize + fmt::Display + ?Sized>(value: &T) -> MethodResult {
    Ok(codec::to_json_or_display(value))
}

/// What the hooks get to see of the transport request.
///
/// A snapshot taken once per render cycle, so it can be shared with every
/// concurrently running method of a batch.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// HTTP verb, e.g. `POST`
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Header names are lower-cased
    pub headers: HashMap<String, String>,
    pub peer: Option<SocketAddr>,
}

impl RequestContext {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Value of a cookie sent with the request
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.header("cookie")?
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Value of a query string parameter (not percent-decoded)
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .as_deref()?
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

/// Arguments a method is invoked with: the request's positional arguments and
/// its named arguments merged over any extra context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl CallArgs {
    pub fn new(args: Vec<Value>, kwargs: Map<String, Value>) -> Self {
        Self { args, kwargs }
    }

    /// Look an argument up by position first, then by name
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.args.get(index).or_else(|| self.kwargs.get(name))
    }

    /// Required argument, bound by position or by name
    pub fn arg<T: DeserializeOwned>(&self, index: usize, name: &str) -> Result<T, MethodFailure> {
        self.optional(index, name)?
            .ok_or_else(|| MethodFailure::new(format!("missing required argument '{}'", name)))
    }

    pub fn optional<T: DeserializeOwned>(
        &self,
        index: usize,
        name: &str,
    ) -> Result<Option<T>, MethodFailure> {
        match self.get(index, name) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                MethodFailure::with_args(
                    format!("argument '{}' has the wrong type: {}", name, e),
                    vec![value.clone()],
                )
            }),
        }
    }
}

type BlockingBody = dyn Fn(CallArgs) -> MethodResult + Send + Sync;
type AsyncBody = dyn Fn(CallArgs) -> BoxFuture<'static, MethodResult> + Send + Sync;

/// A resolved, callable method
#[derive(Clone)]
pub enum Method {
    /// Synchronous body; may block, so the default `defer` runs it on the
    /// blocking pool
    Blocking(Arc<BlockingBody>),
    Async(Arc<AsyncBody>),
}

impl Method {
    pub fn blocking<F>(body: F) -> Self
    where
        F: Fn(CallArgs) -> MethodResult + Send + Sync + 'static,
    {
        Method::Blocking(Arc::new(body))
    }

    pub fn from_async<F, Fut>(body: F) -> Self
    where
        F: Fn(CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MethodResult> + Send + 'static,
    {
        Method::Async(Arc::new(move |call| Box::pin(body(call))))
    }

    /// Run the body on the current task, whatever its flavour
    pub fn invoke_inline(&self, call: CallArgs) -> BoxFuture<'static, MethodResult> {
        match self {
            Method::Blocking(body) => {
                let outcome = body(call);
                Box::pin(async move { outcome })
            }
            Method::Async(body) => body(call),
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Blocking(_) => f.write_str("Method::Blocking"),
            Method::Async(_) => f.write_str("Method::Async"),
        }
    }
}

/// What the `log` hook is told about
#[derive(Debug, Clone, Copy)]
pub enum LogRecord<'a> {
    /// The aggregated reply; `None` when only notifications were sent
    Reply(Option<&'a Reply>),
    /// The single error that ended the render cycle early
    Failure(&'a RpcError),
}

/// Customisation points of the dispatcher.
///
/// Implementations are shared by every concurrently running method of a batch,
/// hence `Send + Sync`; hooks that keep state synchronise it themselves.
#[async_trait]
pub trait ServerEvents: Send + Sync + 'static {
    /// Resolve a method name. `None` answers with `MethodNotFound`.
    ///
    /// The default resolves every name to a method returning `"Test Data"`.
    fn find_method(
        &self,
        name: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Option<Method> {
        let _ = (name, args, kwargs);
        Some(Method::blocking(|_| Ok(Value::String("Test Data".to_string()))))
    }

    /// Resolve and invoke the method for one request.
    ///
    /// `extra` is the context to merge under the request's named arguments;
    /// named arguments win on conflicts.
    async fn call_method(
        &self,
        ctx: &RequestContext,
        request: &Request,
        extra: Map<String, Value>,
    ) -> MethodResult {
        let _ = ctx;
        let mut kwargs = extra;
        kwargs.extend(request.kwargs.clone());

        let method = self
            .find_method(&request.method, &request.args, &kwargs)
            .ok_or_else(|| Box::new(RpcError::method_not_found()) as MethodError)?;

        self.defer(method, CallArgs::new(request.args.clone(), kwargs))
            .await
    }

    /// Decide where a method body runs. Must not change its outcome.
    ///
    /// Blocking bodies go to tokio's blocking pool, async bodies run in place.
    fn defer(&self, method: Method, call: CallArgs) -> BoxFuture<'static, MethodResult> {
        match method {
            Method::Blocking(body) => Box::pin(async move {
                tokio::task::spawn_blocking(move || body(call))
                    .await
                    .unwrap_or_else(|join_error| Err(join_failure(join_error).into()))
            }),
            Method::Async(body) => body(call),
        }
    }

    /// Rewrite freshly decoded content before it is turned into requests
    fn process_content(&self, content: Value, ctx: &RequestContext) -> Value {
        let _ = ctx;
        content
    }

    /// Post-process each successful response
    fn process_request(&self, response: Response, ctx: &RequestContext) -> Response {
        let _ = ctx;
        response
    }

    fn log(&self, record: &LogRecord<'_>, ctx: &RequestContext, error: bool) {
        let _ = (record, ctx, error);
    }

    /// HTTP status to answer with. Always 200 by default so that clients
    /// always get a JSON-RPC body to parse.
    fn response_code(&self, reply: Option<&Reply>) -> u16 {
        let _ = reply;
        200
    }
}

/// Describe a method task that did not run to completion
pub(crate) fn join_failure(join_error: JoinError) -> MethodFailure {
    if join_error.is_panic() {
        let message = panic_message(join_error.into_panic().as_ref());
        MethodFailure::new(format!("method panicked: {}", message))
    } else {
        MethodFailure::new("method was cancelled")
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Every hook at its default
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEvents;

impl ServerEvents for DefaultEvents {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kwargs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_call_args_bind_by_position_or_name() {
        let positional = CallArgs::new(vec![json!(1), json!(2)], Map::new());
        let named = CallArgs::new(vec![], kwargs(json!({"a": 1, "b": 2})));

        for call in [positional, named] {
            assert_eq!(call.arg::<i64>(0, "a").unwrap(), 1);
            assert_eq!(call.arg::<i64>(1, "b").unwrap(), 2);
        }
    }

    #[test]
    fn test_call_args_report_missing_and_mistyped() {
        let call = CallArgs::new(vec![json!("sss")], Map::new());
        let mistyped = call.arg::<i64>(0, "a").unwrap_err();
        assert_eq!(mistyped.args, vec![json!("sss")]);

        let missing = call.arg::<i64>(1, "b").unwrap_err();
        assert!(missing.message.contains("'b'"));
        assert_eq!(call.optional::<i64>(1, "b").unwrap(), None);
    }

    #[test]
    fn test_context_lookups() {
        let mut ctx = RequestContext {
            query: Some("ctxid=42&x=1".to_string()),
            ..Default::default()
        };
        ctx.headers
            .insert("cookie".to_string(), "theme=dark; ctxid=abc".to_string());

        assert_eq!(ctx.cookie("ctxid"), Some("abc"));
        assert_eq!(ctx.header("Cookie"), Some("theme=dark; ctxid=abc"));
        assert_eq!(ctx.query_param("ctxid"), Some("42"));
        assert_eq!(ctx.query_param("missing"), None);
    }

    #[tokio::test]
    async fn test_default_resolver_echoes_test_data() {
        let request = Request::new(1, "anything");
        let result = DefaultEvents
            .call_method(&RequestContext::default(), &request, Map::new())
            .await
            .unwrap();
        assert_eq!(result, json!("Test Data"));
    }

    struct Named;

    impl ServerEvents for Named {
        fn find_method(&self, name: &str, _: &[Value], _: &Map<String, Value>) -> Option<Method> {
            match name {
                "whoami" => Some(Method::from_async(|call: CallArgs| async move {
                    to_result(&call.kwargs.get("user").cloned())
                })),
                _ => None,
            }
        }
    }

    #[tokio::test]
    async fn test_call_method_merges_extra_under_kwargs() {
        let request = Request::new(1, "whoami").with_kwargs(kwargs(json!({"user": "alice"})));
        let result = Named
            .call_method(
                &RequestContext::default(),
                &request,
                kwargs(json!({"user": "mallory", "session": 1})),
            )
            .await
            .unwrap();
        assert_eq!(result, json!("alice"));
    }

    #[tokio::test]
    async fn test_unknown_method_is_method_not_found() {
        let request = Request::new(1, "nope");
        let err = Named
            .call_method(&RequestContext::default(), &request, Map::new())
            .await
            .unwrap_err();
        assert_eq!(RpcError::from_method_error(err), RpcError::method_not_found());
    }

    /// Keyed by coordinates, which JSON object keys cannot hold
    #[derive(Serialize)]
    struct Grid(std::collections::BTreeMap<(u8, u8), char>);

    impl fmt::Display for Grid {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "grid of {} cells", self.0.len())
        }
    }

    #[test]
    fn test_unrepresentable_result_falls_back_to_display() {
        let grid = Grid([((0, 0), 'x'), ((1, 2), 'o')].into_iter().collect());

        assert!(to_result(&grid).is_err());
        assert_eq!(to_result_or_display(&grid).unwrap(), json!("grid of 2 cells"));
        assert_eq!(to_result_or_display(&7).unwrap(), json!(7));
    }

    #[tokio::test]
    async fn test_inline_and_deferred_agree() {
        let method = Method::blocking(|call| to_result(&(call.arg::<i64>(0, "a")? * 2)));
        let call = CallArgs::new(vec![json!(21)], Map::new());

        let inline = method.invoke_inline(call.clone()).await.unwrap();
        let deferred = DefaultEvents.defer(method, call).await.unwrap();
        assert_eq!(inline, deferred);
        assert_eq!(deferred, json!(42));
    }
}
