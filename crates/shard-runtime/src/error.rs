//! # Shard Errors
//!
//! Errors raised by the runtime itself, plus a boxed carrier for backend failures.

/// Errors that can occur while talking to a shard.
#[derive(Debug, thiserror::Error)]
pub enum ShardError {
    #[error("Shard closed")]
    ActorClosed,
    #[error("Shard dropped response channel")]
    ActorDropped,
    #[error("Shard unavailable: {0}")]
    Unavailable(String),
    #[error("Backend error: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}
