//! Error model for endpoint registration and invocation.

use thiserror::Error;

/// Configuration error raised while building a registry.
///
/// Always fatal: a server with ambiguous routing must not start.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error(
        "Endpoint path conflict: '{path}' for '{member}' is already registered by '{existing}' (paths are case-insensitive)"
    )]
    PathConflict {
        path: String,
        member: String,
        existing: String,
    },
}

/// A request could not be bound to an endpoint's parameters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("{endpoint}() missing {} required positional argument{}: {}", .names.len(), plural(.names.len()), quote_list(.names))]
    Missing { endpoint: String, names: Vec<String> },

    #[error("{endpoint}() got an unexpected keyword argument '{name}'")]
    Unexpected { endpoint: String, name: String },

    #[error("{endpoint}() argument '{name}' must be {expected}, got {found}")]
    InvalidType {
        endpoint: String,
        name: String,
        expected: &'static str,
        found: String,
    },

    #[error("{endpoint}() request body must be a JSON object, got {found}")]
    BodyNotObject { endpoint: String, found: &'static str },
}

/// Any failure surfaced by an endpoint call.
///
/// The `Display` text is what clients see under `data.error`, so it is passed
/// through verbatim.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    #[error("{0}")]
    Panicked(String),
}

impl EndpointError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// `'a'`, `'a' and 'b'`, `'a', 'b', and 'c'`.
fn quote_list(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{a} and {b}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}
