//! # Generic Shard Actor
//!
//! This module defines the `ShardActor`, the server half of a shard. It owns the backend and
//! processes messages sequentially, which gives it exclusive access to the backend's connection.

use crate::backend::ShardBackend;
use crate::client::ShardHandle;
use crate::error::ShardError;
use crate::message::ShardRequest;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

enum Next<M> {
    Message(Option<M>),
    Stop,
    SignalDropped,
}

/// The long-lived, single-threaded actor behind a shard instance name.
///
/// # Concurrency Model
/// Every `ShardActor` processes its own mailbox *sequentially* in one Tokio task. Requests
/// routed to the same shard are serialized by construction, so the backend needs no `Mutex`.
/// Different shards are different tasks and run in parallel.
///
/// # Usage Pattern
///
/// 1.  **Create**: `ShardActor::new(name, backend, capacity)` returns the actor and a handle.
/// 2.  **Run**: spawn `actor.run()` in a background task.
/// 3.  **Use**: send requests through the handle (or through handles resolved later from a
///     registry that holds the same mailbox).
///
/// Dropping every handle (and the registry's sender) closes the mailbox; the loop then calls
/// [`ShardBackend::on_stop`] and returns. An actor given a stop signal with
/// [`with_shutdown`](Self::with_shutdown) also closes its mailbox when the signal turns `true`,
/// even while handles are still held. Requests already queued are still answered.
pub struct ShardActor<B: ShardBackend> {
    name: String,
    receiver: mpsc::Receiver<ShardRequest<B>>,
    backend: B,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<B: ShardBackend> ShardActor<B> {
    /// Creates a new `ShardActor` and a handle to it.
    ///
    /// `capacity` bounds the mailbox; when it is full, callers wait for space.
    pub fn new(name: impl Into<String>, backend: B, capacity: usize) -> (Self, ShardHandle<B>) {
        let name = name.into();
        let (sender, receiver) = mpsc::channel(capacity);
        let handle = ShardHandle::new(name.clone(), sender);
        let actor = Self {
            name,
            receiver,
            backend,
            shutdown: None,
        };
        (actor, handle)
    }

    /// Stops accepting requests once `signal` reads `true`.
    pub fn with_shutdown(mut self, signal: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(signal);
        self
    }

    async fn next(&mut self) -> Option<ShardRequest<B>> {
        loop {
            let Some(signal) = self.shutdown.as_mut() else {
                return self.receiver.recv().await;
            };
            let next = tokio::select! {
                msg = self.receiver.recv() => Next::Message(msg),
                stop = signal.wait_for(|stop| *stop) => {
                    if stop.is_ok() { Next::Stop } else { Next::SignalDropped }
                }
            };
            match next {
                Next::Message(msg) => return msg,
                Next::Stop => {
                    debug!(shard = %self.name, "Stop signal, draining mailbox");
                    self.receiver.close();
                    self.shutdown = None;
                }
                Next::SignalDropped => self.shutdown = None,
            }
        }
    }

    /// Runs the event loop until the mailbox closes.
    pub async fn run(mut self) {
        let name = self.name.clone();
        let shard = name.as_str();
        info!(shard, "Shard started");

        if let Err(e) = self.backend.on_start(shard).await {
            warn!(shard, error = %e, "on_start failed, shard refuses requests");
            self.receiver.close();
            while let Some(msg) = self.receiver.recv().await {
                reject(msg, &e.to_string());
            }
            return;
        }

        let mut handled = 0usize;
        while let Some(msg) = self.next().await {
            handled += 1;
            match msg {
                ShardRequest::Execute {
                    request,
                    respond_to,
                } => {
                    debug!(shard, ?request, "Execute");
                    let result = self
                        .backend
                        .execute(request)
                        .await
                        .map_err(|e| ShardError::Backend(Box::new(e)));
                    match &result {
                        Ok(_) => debug!(shard, "Execute ok"),
                        Err(e) => warn!(shard, error = %e, "Execute failed"),
                    }
                    let _ = respond_to.send(result);
                }
                ShardRequest::Batch {
                    requests,
                    options,
                    respond_to,
                } => {
                    let size = requests.len();
                    debug!(shard, size, ?options, "Batch");
                    let result = self
                        .backend
                        .execute_batch(requests, options)
                        .await
                        .map_err(|e| ShardError::Backend(Box::new(e)));
                    match &result {
                        Ok(_) => info!(shard, size, "Batch ok"),
                        Err(e) => warn!(shard, size, error = %e, "Batch failed"),
                    }
                    let _ = respond_to.send(result);
                }
            }
        }

        self.backend.on_stop(shard).await;
        info!(shard, handled, "Shutdown");
    }
}

fn reject<B: ShardBackend>(msg: ShardRequest<B>, reason: &str) {
    let error = || ShardError::Unavailable(reason.to_string());
    match msg {
        ShardRequest::Execute { respond_to, .. } => {
            let _ = respond_to.send(Err(error()));
        }
        ShardRequest::Batch { respond_to, .. } => {
            let _ = respond_to.send(Err(error()));
        }
    }
}
