//! # Shard Handle
//!
//! This module defines the caller-side handle for communicating with a shard.

use crate::backend::ShardBackend;
use crate::error::ShardError;
use crate::message::ShardRequest;
use std::fmt;
use tokio::sync::{mpsc, oneshot};

/// ## ShardHandle
///
/// The `ShardHandle<B>` is the caller's only way to reach a [`ShardActor<B>`](crate::ShardActor).
/// It forwards requests over a Tokio mpsc channel and awaits the reply on a oneshot channel.
///
/// * **Named** – carries the instance name it was resolved from, for logging.
/// * **Fresh per request** – obtain a new handle from a
///   [`ShardRegistry`](crate::ShardRegistry) for every top-level invocation instead of
///   keeping one around.
/// * **Async API** – every call is a single call-and-response exchange.
pub struct ShardHandle<B: ShardBackend> {
    name: String,
    sender: mpsc::Sender<ShardRequest<B>>,
}

impl<B: ShardBackend> Clone for ShardHandle<B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<B: ShardBackend> fmt::Debug for ShardHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardHandle")
            .field("name", &self.name)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl<B: ShardBackend> ShardHandle<B> {
    pub fn new(name: impl Into<String>, sender: mpsc::Sender<ShardRequest<B>>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }

    /// The instance name this handle was resolved from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn sender(&self) -> &mpsc::Sender<ShardRequest<B>> {
        &self.sender
    }

    pub async fn execute(&self, request: B::Request) -> Result<B::Reply, ShardError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(ShardRequest::Execute {
                request,
                respond_to,
            })
            .await
            .map_err(|_| ShardError::ActorClosed)?;
        response.await.map_err(|_| ShardError::ActorDropped)?
    }

    pub async fn execute_batch(
        &self,
        requests: Vec<B::Request>,
        options: B::BatchOptions,
    ) -> Result<Vec<B::Reply>, ShardError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(ShardRequest::Batch {
                requests,
                options,
                respond_to,
            })
            .await
            .map_err(|_| ShardError::ActorClosed)?;
        response.await.map_err(|_| ShardError::ActorDropped)?
    }
}
