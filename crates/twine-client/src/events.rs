//! Client hook pipeline and request id generation.

use std::fmt;

use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use twine_json_rpc::{RequestId, Response};

static SHARED_IDS: Lazy<IdGenerator> = Lazy::new(IdGenerator::new);

/// Produces request ids: a running SHA-256 over a counter, the wall clock and
/// a random value, hex encoded.
///
/// The hasher is never reset, so every id depends on everything generated
/// before it.
pub struct IdGenerator {
    state: Mutex<IdState>,
}

struct IdState {
    counter: u64,
    hasher: Sha256,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IdState {
                counter: 0,
                hasher: Sha256::new(),
            }),
        }
    }

    /// Generator shared by every proxy using the default hooks
    pub fn shared() -> &'static IdGenerator {
        &SHARED_IDS
    }

    pub fn next_id(&self) -> String {
        let mut state = self.state.lock();
        state.counter += 1;
        let counter = state.counter;
        state.hasher.update(counter.to_string());
        state.hasher.update(Utc::now().to_rfc3339());
        state.hasher.update(rand::random::<u64>().to_string());
        format!("{:x}", state.hasher.clone().finalize())
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator")
            .field("issued", &self.state.lock().counter)
            .finish()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Customisation points of a [`Proxy`](crate::Proxy)
pub trait ProxyEvents: Send + Sync {
    /// Rewrite a call's arguments, e.g. to add an authentication token to
    /// every call
    fn get_params(
        &self,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> (Vec<Value>, Map<String, Value>) {
        (args, kwargs)
    }

    /// Look at or rewrite a decoded response before it is unwrapped
    fn proc_response(&self, response: Response) -> Response {
        response
    }

    fn next_id(&self) -> RequestId {
        RequestId::String(IdGenerator::shared().next_id())
    }
}

/// Every hook at its default
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProxyEvents;

impl ProxyEvents for DefaultProxyEvents {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique_hex_digests() {
        let generator = IdGenerator::new();
        let ids: Vec<String> = (0..100).map(|_| generator.next_id()).collect();

        assert!(ids.iter().all(|id| id.len() == 64));
        assert!(ids.iter().all(|id| id.chars().all(|c| c.is_ascii_hexdigit())));
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());
    }

    #[test]
    fn test_default_hooks_pass_through() {
        let args = vec![Value::from(1)];
        let mut kwargs = Map::new();
        kwargs.insert("b".to_string(), Value::from(2));

        let (out_args, out_kwargs) = DefaultProxyEvents.get_params(args.clone(), kwargs.clone());
        assert_eq!(out_args, args);
        assert_eq!(out_kwargs, kwargs);
        assert!(matches!(DefaultProxyEvents.next_id(), RequestId::String(_)));
    }
}
