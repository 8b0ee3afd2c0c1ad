//! # Shard Registry
//!
//! A registry maps a stable instance name to a shard and hands out handles to it.
//!
//! The registry is a *capability*: code that needs a shard receives `&dyn ShardRegistry<B>`
//! for the duration of one call and resolves a handle right there. Nothing keeps handles
//! around between independent top-level invocations, so a handle can never outlive the
//! request that resolved it.
//!
//! [`LocalRegistry`] is the in-process implementation: shards are Tokio tasks spawned on first
//! resolve and kept alive until [`LocalRegistry::shutdown`], which stops them even if handles
//! are still held somewhere.

use crate::actor::ShardActor;
use crate::backend::ShardBackend;
use crate::client::ShardHandle;
use crate::error::ShardError;
use crate::message::ShardRequest;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Resolves a stable instance name to a fresh handle.
pub trait ShardRegistry<B: ShardBackend>: Send + Sync {
    /// Returns a new handle to the shard named `name`.
    fn resolve(&self, name: &str) -> Result<ShardHandle<B>, ShardError>;
}

type BackendFactory<B> = Box<dyn Fn(&str) -> B + Send + Sync>;

struct LocalShard<B: ShardBackend> {
    sender: mpsc::Sender<ShardRequest<B>>,
    task: JoinHandle<()>,
}

/// In-process registry that spawns one [`ShardActor`] per instance name on demand.
///
/// The factory is called once per name, the first time it is resolved. A shard whose task
/// has ended (for example because its backend failed to start) is respawned on the next
/// resolve.
pub struct LocalRegistry<B: ShardBackend> {
    factory: BackendFactory<B>,
    capacity: usize,
    shards: Mutex<BTreeMap<String, LocalShard<B>>>,
    stop: watch::Sender<bool>,
}

impl<B: ShardBackend> LocalRegistry<B> {
    /// Creates an empty registry. `capacity` is the mailbox size of every spawned shard.
    pub fn new(capacity: usize, factory: impl Fn(&str) -> B + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            capacity,
            shards: Mutex::new(BTreeMap::new()),
            stop: watch::channel(false).0,
        }
    }

    /// Names of the shards spawned so far.
    pub fn shard_names(&self) -> Vec<String> {
        self.shards.lock().keys().cloned().collect()
    }

    /// Signals every shard to stop and waits for all shard tasks to finish.
    ///
    /// Each shard answers what is already in its mailbox, then runs `on_stop`. Handles still
    /// held afterwards get [`ShardError::ActorClosed`].
    pub async fn shutdown(self) {
        let shards = self.shards.into_inner();
        info!(count = shards.len(), "Shutting down shards");
        self.stop.send_replace(true);
        for (name, shard) in shards {
            drop(shard.sender);
            let _ = shard.task.await;
            debug!(shard = %name, "Shard stopped");
        }
    }
}

impl<B: ShardBackend> ShardRegistry<B> for LocalRegistry<B> {
    fn resolve(&self, name: &str) -> Result<ShardHandle<B>, ShardError> {
        let mut shards = self.shards.lock();
        if let Some(shard) = shards.get(name) {
            if !shard.sender.is_closed() {
                return Ok(ShardHandle::new(name, shard.sender.clone()));
            }
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ShardError::Unavailable(format!("cannot spawn shard {name}: {e}")))?;
        let backend = (self.factory)(name);
        let (actor, handle) = ShardActor::new(name, backend, self.capacity);
        let task = runtime.spawn(actor.with_shutdown(self.stop.subscribe()).run());
        info!(shard = name, "Spawned shard");
        shards.insert(
            name.to_string(),
            LocalShard {
                sender: handle.sender().clone(),
                task,
            },
        );
        Ok(handle)
    }
}
