//! Process-wide mapping from error code to [`ErrorKind`].
//!
//! Seeded with the built-in kinds the first time it is touched. Applications
//! that raise their own codes register them once at startup with
//! [`register_error_kind`] so that clients rebuild errors of the right kind;
//! codes nobody registered resolve to [`ErrorKind::Generic`].

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

use crate::error::ErrorKind;

static REGISTRY: Lazy<RwLock<HashMap<i64, ErrorKind>>> = Lazy::new(|| {
    let builtins = [
        ErrorKind::Generic,
        ErrorKind::Parse,
        ErrorKind::InvalidRequest,
        ErrorKind::MethodNotFound,
    ];
    RwLock::new(builtins.into_iter().map(|kind| (kind.code(), kind)).collect())
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("error code {0} belongs to a built-in kind")]
    ReservedCode(i64),

    #[error("error code {code} is already registered as {existing}")]
    AlreadyRegistered { code: i64, existing: &'static str },
}

/// Kind registered for `code`, or [`ErrorKind::Generic`]
pub fn lookup(code: i64) -> ErrorKind {
    REGISTRY
        .read()
        .get(&code)
        .copied()
        .unwrap_or(ErrorKind::Generic)
}

/// Register a custom kind. Registering the same name twice for a code is a no-op.
pub fn register_error_kind(code: i64, name: &'static str) -> Result<ErrorKind, RegistryError> {
    let mut registry = REGISTRY.write();
    match registry.get(&code) {
        Some(ErrorKind::Custom { name: existing, .. }) if *existing == name => {
            Ok(ErrorKind::Custom { code, name })
        }
        Some(ErrorKind::Custom { name: existing, .. }) => Err(RegistryError::AlreadyRegistered {
            code,
            existing: *existing,
        }),
        Some(_) => Err(RegistryError::ReservedCode(code)),
        None => {
            let kind = ErrorKind::Custom { code, name };
            registry.insert(code, kind);
            Ok(kind)
        }
    }
}

/// Every code currently known, sorted
pub fn registered_codes() -> Vec<i64> {
    let mut codes: Vec<i64> = REGISTRY.read().keys().copied().collect();
    codes.sort_unstable();
    codes
}
