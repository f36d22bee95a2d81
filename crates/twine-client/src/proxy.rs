//! The client proxy.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};
use twine_json_rpc::{ErrorObject, JsonEquivalent, Request, Response, codec};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::{DefaultProxyEvents, ProxyEvents};
use crate::transport::{HttpPost, HttpTransport};

/// Path used when none is given
pub const DEFAULT_PATH: &str = "jsonrpc";

/// One `(result, error)` pair of a batch reply; exactly one side is set
pub type BatchOutput = (Option<Value>, Option<ErrorObject>);

/// A handle on a JSON-RPC endpoint, optionally bound to a method name.
///
/// Proxies are cheap immutable values: [`Proxy::method`] returns a new proxy
/// sharing the endpoint, hooks and transport, so calls can be made
/// concurrently from clones.
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), twine_client::ClientError> {
/// use serde_json::json;
/// use twine_client::Proxy;
///
/// let proxy = Proxy::from_url("http://localhost:8007/jsonrpc")?;
/// let sum = proxy.method("add").call_args(vec![json!(1), json!(2)]).await?;
/// assert_eq!(sum, json!(3));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Proxy {
    origin: String,
    path: String,
    service_name: Option<String>,
    events: Arc<dyn ProxyEvents>,
    transport: Arc<dyn HttpPost>,
}

impl Proxy {
    /// Proxy for `path` on `host`, talking over a default [`HttpTransport`]
    pub fn new(host: &str, path: &str) -> ClientResult<Self> {
        Self::with_config(host, path, &ClientConfig::default())
    }

    pub fn with_default_path(host: &str) -> ClientResult<Self> {
        Self::new(host, DEFAULT_PATH)
    }

    pub fn with_config(host: &str, path: &str, config: &ClientConfig) -> ClientResult<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(host, path, Arc::new(transport)))
    }

    /// Proxy over any transport; performs no I/O
    pub fn with_transport(host: &str, path: &str, transport: Arc<dyn HttpPost>) -> Self {
        let (origin, path) = normalize(host, path);
        Self {
            origin,
            path,
            service_name: None,
            events: Arc::new(DefaultProxyEvents),
            transport,
        }
    }

    /// Split an absolute URL into origin and path; query and fragment stay
    /// with the path. Nothing else about the URL is rewritten.
    pub fn from_url(url: &str) -> ClientResult<Self> {
        let (origin, path) = split_url(url)?;
        Self::new(&origin, &path)
    }

    pub fn from_url_with_config(url: &str, config: &ClientConfig) -> ClientResult<Self> {
        let (origin, path) = split_url(url)?;
        Self::with_config(&origin, &path, config)
    }

    pub fn from_url_with_transport(url: &str, transport: Arc<dyn HttpPost>) -> ClientResult<Self> {
        let (origin, path) = split_url(url)?;
        Ok(Self::with_transport(&origin, &path, transport))
    }

    /// Replace the hooks of this proxy and every proxy derived from it
    pub fn customize<E: ProxyEvents + 'static>(self, events: E) -> Self {
        self.customize_shared(Arc::new(events))
    }

    pub fn customize_shared(mut self, events: Arc<dyn ProxyEvents>) -> Self {
        self.events = events;
        self
    }

    /// A proxy for `name`, dot-joined under this proxy's own name:
    /// `proxy.method("math").method("add")` calls `math.add`
    pub fn method(&self, name: &str) -> Self {
        let service_name = match &self.service_name {
            Some(prefix) => format!("{}.{}", prefix, name),
            None => name.to_string(),
        };
        Self {
            service_name: Some(service_name),
            ..self.clone()
        }
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Where requests are POSTed
    pub fn url(&self) -> String {
        if self.path.is_empty() {
            format!("{}/", self.origin)
        } else if self.path.contains(['?', '#']) {
            format!("{}/{}", self.origin, self.path)
        } else {
            format!("{}/{}/", self.origin, self.path)
        }
    }

    /// Call the bound method and unwrap its result.
    ///
    /// A JSON-RPC error reply comes back as [`ClientError::Rpc`] carrying the
    /// kind registered for its code.
    pub async fn call(&self, args: Vec<Value>, kwargs: Map<String, Value>) -> ClientResult<Value> {
        let request = self.build_request(args, kwargs)?;
        let body = codec::encode_bytes(&request.json_equivalent()?)?;
        let url = self.url();
        debug!(method = %request.method, id = ?request.id, %url, "calling");

        let reply = self.transport.post(&url, body).await?;
        let response = Response::from_value(codec::decode(&reply)?)?;
        if response.id != request.id {
            warn!(expected = ?request.id, got = ?response.id, "response id does not match request");
        }

        let response = self.events.proc_response(response);
        Ok(response.get_result()?)
    }

    pub async fn call_args(&self, args: Vec<Value>) -> ClientResult<Value> {
        self.call(args, Map::new()).await
    }

    pub async fn call_kwargs(&self, kwargs: Map<String, Value>) -> ClientResult<Value> {
        self.call(Vec::new(), kwargs).await
    }

    /// Call a method by name without building a derived proxy first
    pub async fn call_method(
        &self,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> ClientResult<Value> {
        self.method(method).call(args, kwargs).await
    }

    /// Send several calls in one POST.
    ///
    /// Returns one pair per response, in the order the server answered;
    /// correlate by id if order matters. A server that collapses the batch into
    /// a single error object yields a one-element list.
    pub async fn batch_call<I, S>(&self, calls: I) -> ClientResult<Vec<BatchOutput>>
    where
        I: IntoIterator<Item = (S, (Vec<Value>, Map<String, Value>))>,
        S: AsRef<str>,
    {
        let wire = calls
            .into_iter()
            .map(|(name, (args, kwargs))| {
                self.method(name.as_ref())
                    .build_request(args, kwargs)?
                    .json_equivalent()
                    .map_err(ClientError::from)
            })
            .collect::<ClientResult<Vec<_>>>()?;
        if wire.is_empty() {
            return Err(ClientError::usage("a batch needs at least one call"));
        }

        let url = self.url();
        debug!(count = wire.len(), %url, "sending batch");
        let reply = self.transport.post(&url, codec::encode_bytes(&wire)?).await?;

        match codec::decode(&reply)? {
            Value::Array(items) if items.is_empty() => {
                Err(ClientError::InvalidResponse("empty batch reply".to_string()))
            }
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.unwrap_output(item))
                .collect(),
            object @ Value::Object(_) => {
                warn!("batch answered with a single object");
                Ok(vec![self.unwrap_output(object)?])
            }
            other => Err(ClientError::InvalidResponse(format!(
                "batch reply is neither an array nor an object: {}",
                other
            ))),
        }
    }

    fn build_request(&self, args: Vec<Value>, kwargs: Map<String, Value>) -> ClientResult<Request> {
        let method = self
            .service_name
            .clone()
            .ok_or_else(|| ClientError::usage("no method name bound; use Proxy::method first"))?;
        let (args, kwargs) = self.events.get_params(args, kwargs);
        Ok(Request::new(self.events.next_id(), method)
            .with_args(args)
            .with_kwargs(kwargs))
    }

    fn unwrap_output(&self, item: Value) -> ClientResult<BatchOutput> {
        let response = Response::from_value(item)?;
        Ok(self.events.proc_response(response).get_output())
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("url", &self.url())
            .field("service_name", &self.service_name)
            .finish()
    }
}

/// Strip one trailing slash from the origin and one slash from each end of
/// the path
fn normalize(host: &str, path: &str) -> (String, String) {
    let origin = host.strip_suffix('/').unwrap_or(host);
    let path = path.strip_suffix('/').unwrap_or(path);
    let path = path.strip_prefix('/').unwrap_or(path);
    (origin.to_string(), path.to_string())
}

/// Cut `url` at the authority/path boundary. `Url` only validates; the
/// caller's text is kept as written (ports, host case and escapes included).
fn split_url(url: &str) -> ClientResult<(String, String)> {
    let parsed = Url::parse(url).map_err(|e| ClientError::Url(format!("{}: {}", url, e)))?;
    if !parsed.has_host() {
        return Err(ClientError::Url(format!("{}: no host", url)));
    }
    let authority = url
        .find("://")
        .map(|at| at + 3)
        .ok_or_else(|| ClientError::Url(format!("{}: no authority", url)))?;
    let boundary = url[authority..]
        .find(['/', '?', '#'])
        .map_or(url.len(), |at| authority + at);
    Ok((url[..boundary].to_string(), url[boundary..].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use twine_json_rpc::{ErrorKind, RequestId};

    /// Records POSTs and answers each with a canned reply
    struct Canned {
        reply: Value,
        posted: Mutex<Vec<(String, Value)>>,
    }

    impl Canned {
        fn new(reply: Value) -> Arc<Self> {
            Arc::new(Self {
                reply,
                posted: Mutex::new(Vec::new()),
            })
        }

        fn last_body(&self) -> Value {
            self.posted.lock().last().map(|(_, body)| body.clone()).unwrap()
        }
    }

    #[async_trait]
    impl HttpPost for Canned {
        async fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
            self.posted
                .lock()
                .push((url.to_string(), serde_json::from_slice(&body).unwrap()));
            Ok(serde_json::to_vec(&self.reply).unwrap())
        }
    }

    fn proxy(reply: Value) -> (Proxy, Arc<Canned>) {
        let transport = Canned::new(reply);
        let proxy = Proxy::with_transport("http://localhost:8007", "jsonrpc", transport.clone());
        (proxy, transport)
    }

    #[test]
    fn test_url() {
        let transport: Arc<dyn HttpPost> = Canned::new(Value::Null);
        let url = |u: &str| Proxy::from_url_with_transport(u, transport.clone()).unwrap().url();

        assert_eq!(url("http://localhost:8007"), "http://localhost:8007/");
        assert_eq!(url("http://localhost:8007/aaa/"), "http://localhost:8007/aaa/");
        assert_eq!(url("http://localhost:8007/aaa"), "http://localhost:8007/aaa/");

        let with_path =
            |host: &str, path: &str| Proxy::with_transport(host, path, transport.clone()).url();
        assert_eq!(
            with_path("http://localhost:8007", DEFAULT_PATH),
            "http://localhost:8007/jsonrpc/"
        );
        assert_eq!(with_path("http://localhost:8007", "aaa"), "http://localhost:8007/aaa/");
        assert_eq!(with_path("http://localhost:8007/", "/aaa/"), "http://localhost:8007/aaa/");
        assert_eq!(with_path("http://localhost:8007/", "aaa/"), "http://localhost:8007/aaa/");
    }

    #[test]
    fn test_url_keeps_query_and_fragment() {
        let transport: Arc<dyn HttpPost> = Canned::new(Value::Null);
        let url = |u: &str| Proxy::from_url_with_transport(u, transport.clone()).unwrap().url();
        assert_eq!(url("http://localhost:8007/rpc?ctxid=1"), "http://localhost:8007/rpc?ctxid=1");
        assert_eq!(url("http://localhost:8007/rpc#frag"), "http://localhost:8007/rpc#frag");
        assert_eq!(url("http://localhost:8007?ctxid=1"), "http://localhost:8007/?ctxid=1");
    }

    #[test]
    fn test_url_is_split_as_written() {
        let transport: Arc<dyn HttpPost> = Canned::new(Value::Null);
        let url = |u: &str| Proxy::from_url_with_transport(u, transport.clone()).unwrap().url();

        assert_eq!(url("http://h:80/x"), "http://h:80/x/");
        assert_eq!(url("https://h:443/x"), "https://h:443/x/");
        assert_eq!(url("http://LocalHost:8007/RPC"), "http://LocalHost:8007/RPC/");
        assert_eq!(url("http://h/a b/%7Euser"), "http://h/a b/%7Euser/");
        assert_eq!(url("http://user:pw@h:8007/rpc"), "http://user:pw@h:8007/rpc/");
    }

    #[test]
    fn test_bad_urls() {
        let transport: Arc<dyn HttpPost> = Canned::new(Value::Null);
        assert!(matches!(
            Proxy::from_url_with_transport("not a url", transport.clone()),
            Err(ClientError::Url(_))
        ));
        assert!(matches!(
            Proxy::from_url_with_transport("mailto:someone@example.com", transport),
            Err(ClientError::Url(_))
        ));
    }

    #[test]
    fn test_method_chaining_is_dot_joined() {
        let (root, _) = proxy(Value::Null);
        let add = root.method("math").method("add");
        assert_eq!(add.service_name(), Some("math.add"));
        assert_eq!(root.service_name(), None);
        assert_eq!(add.url(), root.url());
    }

    #[tokio::test]
    async fn test_call_builds_request_and_unwraps_result() {
        let (root, transport) = proxy(json!({"jsonrpc": "2.0", "id": "x", "result": 3}));
        let result = root.method("add").call_args(vec![json!(1), json!(2)]).await.unwrap();
        assert_eq!(result, json!(3));

        let body = transport.last_body();
        assert_eq!(body["method"], json!("add"));
        assert_eq!(body["params"], json!([1, 2]));
        assert_eq!(body["jsonrpc"], json!("2.0"));
        assert_eq!(body["id"].as_str().unwrap().len(), 64);
        assert_eq!(transport.posted.lock()[0].0, "http://localhost:8007/jsonrpc/");
    }

    #[tokio::test]
    async fn test_call_raises_registered_kind() {
        let (root, _) = proxy(json!({
            "jsonrpc": "2.0", "id": "x",
            "error": {"code": -32601, "message": "Procedure not found."}
        }));
        let err = root.method("missingmethod").call(vec![], Map::new()).await.unwrap_err();
        assert!(err.is_kind(ErrorKind::MethodNotFound));
    }

    #[tokio::test]
    async fn test_unbound_proxy_cannot_call() {
        let (root, transport) = proxy(Value::Null);
        let err = root.call_args(vec![]).await.unwrap_err();
        assert!(matches!(err, ClientError::Usage(_)));
        assert!(transport.posted.lock().is_empty());
    }

    #[tokio::test]
    async fn test_reserved_kwarg_is_rejected_before_sending() {
        let (root, transport) = proxy(Value::Null);
        let mut kwargs = Map::new();
        kwargs.insert("__args".to_string(), json!([1]));
        let err = root.method("add").call_kwargs(kwargs).await.unwrap_err();
        assert!(matches!(err, ClientError::Codec(_)));
        assert!(transport.posted.lock().is_empty());
    }

    /// Counts hook invocations and stamps a token into every call
    #[derive(Default)]
    struct Stamping {
        get_params: Mutex<Vec<(Vec<Value>, Map<String, Value>)>>,
        proc_response: Mutex<usize>,
    }

    impl ProxyEvents for Arc<Stamping> {
        fn get_params(
            &self,
            args: Vec<Value>,
            mut kwargs: Map<String, Value>,
        ) -> (Vec<Value>, Map<String, Value>) {
            self.get_params.lock().push((args.clone(), kwargs.clone()));
            kwargs.insert("token".to_string(), json!("t0k"));
            (args, kwargs)
        }

        fn proc_response(&self, response: Response) -> Response {
            *self.proc_response.lock() += 1;
            response
        }

        fn next_id(&self) -> RequestId {
            RequestId::Number(7)
        }
    }

    #[tokio::test]
    async fn test_hooks_are_invoked() {
        let hooks = Arc::new(Stamping::default());
        let (root, transport) = proxy(json!({"jsonrpc": "2.0", "id": 7, "result": 3}));
        let root = root.customize(hooks.clone());

        root.method("add").call_args(vec![json!(1), json!(2)]).await.unwrap();
        assert_eq!(*hooks.get_params.lock(), vec![(vec![json!(1), json!(2)], Map::new())]);
        assert_eq!(*hooks.proc_response.lock(), 1);

        let body = transport.last_body();
        assert_eq!(body["id"], json!(7));
        assert_eq!(body["params"], json!({"__args": [1, 2], "token": "t0k"}));
    }

    #[tokio::test]
    async fn test_batch_call_returns_pairs_in_server_order() {
        let (root, transport) = proxy(json!([
            {"jsonrpc": "2.0", "id": "b", "result": 1},
            {"jsonrpc": "2.0", "id": "a", "error": {"code": 0, "message": "bad"}}
        ]));

        let outputs = root
            .batch_call(vec![
                ("add", (vec![json!(1), json!(2)], Map::new())),
                ("subtract", (vec![json!(2), json!(1)], Map::new())),
            ])
            .await
            .unwrap();

        assert_eq!(outputs[0], (Some(json!(1)), None));
        assert_eq!(outputs[1].0, None);
        assert_eq!(outputs[1].1.as_ref().unwrap().message, "bad");

        let body = transport.last_body();
        let sent = body.as_array().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["method"], json!("add"));
        assert_eq!(sent[1]["method"], json!("subtract"));
        assert_ne!(sent[0]["id"], sent[1]["id"]);
    }

    #[tokio::test]
    async fn test_batch_collapsed_to_object() {
        let (root, _) = proxy(json!({
            "jsonrpc": "2.0", "id": null,
            "error": {"code": -32600, "message": "Invalid Request."}
        }));
        let outputs = root
            .batch_call(vec![("add", (vec![json!(1)], Map::new()))])
            .await
            .unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].1.as_ref().unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_batch_rejects_unusable_replies() {
        for reply in [json!([]), json!(42)] {
            let (root, _) = proxy(reply);
            let err = root
                .batch_call(vec![("add", (vec![json!(1)], Map::new()))])
                .await
                .unwrap_err();
            assert!(matches!(err, ClientError::InvalidResponse(_)));
        }

        let (root, _) = proxy(Value::Null);
        let empty: Vec<(&str, (Vec<Value>, Map<String, Value>))> = Vec::new();
        assert!(matches!(root.batch_call(empty).await, Err(ClientError::Usage(_))));
    }
}
