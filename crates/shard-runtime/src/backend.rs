//! # ShardBackend Trait
//!
//! The `ShardBackend` trait is the contract a shard's owned resource must implement to be
//! hosted by the generic [`ShardActor`](crate::ShardActor). The backend is the only thing
//! that holds a live connection to whatever the shard fronts (a database, a device, a file).
//! Callers never see it; they talk to the shard through a [`ShardHandle`](crate::ShardHandle).
//!
//! # Architecture Note
//! The actor owns the backend by value and calls it from a single task, so every hook takes
//! `&mut self` and no locking is needed inside an implementation. Requests routed to the same
//! shard are therefore serialized, while different shards run concurrently.
//!
//! Associated types keep the wire contract typed: a backend that speaks JSON envelopes declares
//! `type Request = serde_json::Value`, and the compiler stops anyone from sending it anything else.

use async_trait::async_trait;
use std::fmt::Debug;

/// Trait that a shard-owned resource implements to be driven by [`ShardActor`](crate::ShardActor).
#[async_trait]
pub trait ShardBackend: Send + 'static {
    /// A single call-and-response request.
    type Request: Send + Debug + 'static;

    /// The reply to one request.
    type Reply: Send + Debug + 'static;

    /// Options shared by every request of a batch (e.g. transaction settings).
    type BatchOptions: Send + Debug + 'static;

    /// The backend's error type. Failures are boxed into
    /// [`ShardError::Backend`](crate::ShardError::Backend) on their way back to the caller,
    /// so callers can downcast to recover the original error.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Called once when the actor loop starts, before the first request.
    async fn on_start(&mut self, _shard: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Execute one request.
    async fn execute(&mut self, request: Self::Request) -> Result<Self::Reply, Self::Error>;

    /// Execute an ordered batch as one unit. Replies must come back in request order.
    /// A failure reports the whole batch as failed.
    async fn execute_batch(
        &mut self,
        requests: Vec<Self::Request>,
        options: Self::BatchOptions,
    ) -> Result<Vec<Self::Reply>, Self::Error>;

    /// Called once after the mailbox closes.
    async fn on_stop(&mut self, _shard: &str) {}
}
