//! # Shard Messages
//!
//! This module defines the message types exchanged between a [`ShardHandle`](crate::ShardHandle)
//! and its [`ShardActor`](crate::ShardActor).

use crate::backend::ShardBackend;
use crate::error::ShardError;
use tokio::sync::oneshot;

/// Type alias for the one-shot response channel used by shards.
pub type Response<T> = oneshot::Sender<Result<T, ShardError>>;

/// Internal message type sent to a shard.
///
/// Every variant is exactly one call-and-response exchange: the caller sends the request with
/// a oneshot sender and awaits the single reply. There is no streaming and no pipelining on a
/// single call.
///
/// - **Execute**: a single request.
/// - **Batch**: an ordered list of requests applied as one unit under shared options.
#[derive(Debug)]
pub enum ShardRequest<B: ShardBackend> {
    Execute {
        request: B::Request,
        respond_to: Response<B::Reply>,
    },
    Batch {
        requests: Vec<B::Request>,
        options: B::BatchOptions,
        respond_to: Response<Vec<B::Reply>>,
    },
}
