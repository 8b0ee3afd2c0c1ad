//! Error types for the bridge.

use crate::config::ConfigError;
use crate::protocol::Scope;
use crate::store::StoreError;
use shard_runtime::ShardError;
use thiserror::Error;

/// Errors a bridge caller can see.
///
/// Failures raised on the shard travel back boxed inside [`ShardError::Backend`] and are
/// unboxed again by the `From<ShardError>` impl, so a caller matches on the same variant the
/// shard produced.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Invalid or missing configuration, including an unbound registry.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An operation name outside the closed set, or one sent to the wrong executor.
    #[error("Unsupported operation {operation:?}{}", describe_scope(.scope))]
    UnsupportedOperation {
        scope: Option<Scope>,
        operation: String,
    },

    /// The shard could not be reached or dropped the reply.
    #[error("Transport error: {0}")]
    Transport(ShardError),

    /// The backing store rejected the operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A required argument is missing or has the wrong shape.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A reply did not have the expected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

fn describe_scope(scope: &Option<Scope>) -> String {
    scope
        .map(|s| format!(" for {s} scope"))
        .unwrap_or_default()
}

impl From<ShardError> for BridgeError {
    fn from(error: ShardError) -> Self {
        match error {
            ShardError::Backend(inner) => match inner.downcast::<BridgeError>() {
                Ok(bridge) => *bridge,
                Err(other) => BridgeError::Transport(ShardError::Backend(other)),
            },
            other => BridgeError::Transport(other),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(error: serde_json::Error) -> Self {
        BridgeError::Protocol(error.to_string())
    }
}
