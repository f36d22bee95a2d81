//! Request processing for one render cycle.
//!
//! decode -> `process_content` -> validate -> fan out `call_method` ->
//! `process_request` -> aggregate -> `log` -> write. Requests of a batch run
//! concurrently; responses keep request order.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, join_all};
use serde_json::{Map, Value, json};
use tracing::{debug, error, warn};

use crate::codec;
use crate::error::RpcError;
use crate::events::{
    DefaultEvents, LogRecord, RequestContext, ServerEvents, join_failure, panic_message,
};
use crate::exchange::Exchange;
use crate::request::Incoming;
use crate::response::{Reply, Response};
use crate::types::RequestId;

/// A failure that ends a render cycle with a single error response
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub id: Option<RequestId>,
    pub error: RpcError,
}

impl Rejection {
    pub fn new(id: Option<RequestId>, error: RpcError) -> Self {
        Self { id, error }
    }

    pub fn into_response(self) -> Response {
        Response::failure(self.id, self.error)
    }

    pub fn into_reply(self) -> Reply {
        Reply::Single(self.into_response())
    }
}

/// Runs request payloads through a [`ServerEvents`] pipeline
#[derive(Clone)]
pub struct Dispatcher {
    events: Arc<dyn ServerEvents>,
}

impl Dispatcher {
    pub fn new<E: ServerEvents>(events: E) -> Self {
        Self {
            events: Arc::new(events),
        }
    }

    pub fn from_shared(events: Arc<dyn ServerEvents>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &Arc<dyn ServerEvents> {
        &self.events
    }

    /// Full render cycle: read the body, process it and write the reply.
    ///
    /// Nothing escapes: every failure ends up as an error response, and the
    /// exchange is always finished.
    pub async fn render(&self, exchange: &mut dyn Exchange, extra: Map<String, Value>) {
        let ctx = exchange.context();
        let reply = match exchange.read_body().await {
            Ok(body) => self.respond(&body, &ctx, extra).await,
            Err(err) => {
                warn!(error = %err, path = %ctx.path, "could not read request body");
                let rejected = Rejection::new(None, RpcError::unstructured(err.to_string(), None));
                self.guarded(future::ready(Err(rejected)), &ctx).await
            }
        };

        self.write_reply(exchange, reply.as_ref());
        exchange.finish();
    }

    /// Process a payload and return what should be written back, logging the
    /// outcome. `None` means nothing is written (notifications only).
    pub async fn respond(
        &self,
        body: &[u8],
        ctx: &RequestContext,
        extra: Map<String, Value>,
    ) -> Option<Reply> {
        self.guarded(self.handle(body, ctx, extra), ctx).await
    }

    /// The processing pipeline without logging or the last-resort boundary.
    ///
    /// `Err` carries the one error that replaces the whole reply: a parse
    /// failure, an invalid request anywhere in a batch, or an empty batch.
    pub async fn handle(
        &self,
        body: &[u8],
        ctx: &RequestContext,
        extra: Map<String, Value>,
    ) -> Result<Option<Reply>, Rejection> {
        let content = codec::decode(body).map_err(|err| {
            debug!(error = %err, "request body is not JSON");
            Rejection::new(None, RpcError::parse_error())
        })?;

        let content = self.events.process_content(content, ctx);
        let incoming = Incoming::from_value(content);
        let is_batch = incoming.is_batch();
        let requests = incoming.into_requests();

        for request in &requests {
            request
                .check()
                .map_err(|error| Rejection::new(request.id.clone(), error))?;
        }
        if requests.is_empty() {
            debug!("empty batch");
            return Err(Rejection::new(None, RpcError::invalid_request()));
        }

        debug!(count = requests.len(), batch = is_batch, "dispatching requests");

        let shared_ctx = Arc::new(ctx.clone());
        let (ids, tasks): (Vec<_>, Vec<_>) = requests
            .into_iter()
            .map(|request| {
                let mut context = request.extra.clone();
                context.extend(extra.clone());

                let events = Arc::clone(&self.events);
                let ctx = Arc::clone(&shared_ctx);
                let id = request.id.clone();
                let task = tokio::spawn(async move {
                    debug!(method = %request.method, id = ?request.id, "calling method");
                    events.call_method(&ctx, &request, context).await
                });
                (id, task)
            })
            .unzip();

        let outcomes = join_all(tasks).await;

        let mut responses = Vec::with_capacity(outcomes.len());
        for (id, outcome) in ids.into_iter().zip(outcomes) {
            let response = match outcome {
                Ok(Ok(result)) => self
                    .events
                    .process_request(Response::success(id, result), ctx),
                Ok(Err(err)) => {
                    let error = RpcError::from_method_error(err);
                    debug!(id = ?id, %error, "method failed");
                    Response::failure(id, error)
                }
                Err(join_error) => {
                    warn!(id = ?id, error = %join_error, "method task failed");
                    Response::failure(id, join_failure(join_error).into())
                }
            };

            // Notifications never get an answer, not even an error
            if response.id.is_some() {
                responses.push(response);
            }
        }

        if responses.is_empty() {
            return Ok(None);
        }
        if is_batch {
            Ok(Some(Reply::Batch(responses)))
        } else {
            Ok(responses.pop().map(Reply::Single))
        }
    }

    /// Log the outcome and turn anything that unwinds into a code 0 error
    async fn guarded<F>(&self, outcome: F, ctx: &RequestContext) -> Option<Reply>
    where
        F: Future<Output = Result<Option<Reply>, Rejection>>,
    {
        let events = &self.events;
        let logged = async move {
            match outcome.await {
                Ok(reply) => {
                    events.log(&LogRecord::Reply(reply.as_ref()), ctx, false);
                    reply
                }
                Err(rejection) => {
                    events.log(&LogRecord::Failure(&rejection.error), ctx, true);
                    Some(rejection.into_reply())
                }
            }
        };

        match AssertUnwindSafe(logged).catch_unwind().await {
            Ok(reply) => reply,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(%message, "request processing panicked");
                let error = RpcError::unstructured(message.clone(), Some(json!([message])));
                Some(Reply::Single(Response::failure(None, error)))
            }
        }
    }

    fn write_reply(&self, exchange: &mut dyn Exchange, reply: Option<&Reply>) {
        let events = &self.events;
        let status = panic::catch_unwind(AssertUnwindSafe(|| events.response_code(reply)))
            .unwrap_or_else(|payload| {
                error!(message = %panic_message(payload.as_ref()), "response_code hook panicked");
                200
            });
        exchange.set_status(status);

        let Some(reply) = reply else {
            return;
        };

        let body = codec::encode_bytes(reply).or_else(|err| {
            error!(error = %err, "failed to encode reply");
            let fallback = Response::failure(None, RpcError::unstructured(err.to_string(), None));
            codec::encode_bytes(&fallback)
        });

        match body {
            Ok(body) => {
                exchange.set_header("content-type", "application/json");
                exchange.set_header("content-length", &body.len().to_string());
                exchange.write(&body);
            }
            Err(err) => error!(error = %err, "reply dropped"),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DefaultEvents)
    }
}
