//! # Document Shard
//!
//! The shard side of the bridge. A [`DocumentShard`] owns one [`DocumentStore`] connection
//! and is hosted by a [`ShardActor`](shard_runtime::ShardActor), which serializes every request
//! routed to it.
//!
//! ## Structure
//!
//! - [`backend`] - [`ShardBackend`](shard_runtime::ShardBackend) implementation: wire envelope
//!   in, wire reply out; batches run in one store transaction
//! - [`executor`] - collection- and database-scoped operation executors
//! - [`session`] - where each operation's options live, for session injection
//!
//! ```rust
//! use docbridge::shard_actor::DocumentShard;
//! use docbridge::store::MockStore;
//! use shard_runtime::{LocalRegistry, ShardRegistry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = LocalRegistry::new(32, |_name: &str| DocumentShard::new(MockStore::new()));
//!     let handle = registry.resolve("mongo_shard_0").unwrap();
//!     let reply = handle
//!         .execute(serde_json::json!({"collectionName": "users", "operation": "countDocuments"}))
//!         .await
//!         .unwrap();
//!     assert_eq!(reply, serde_json::json!(0));
//!
//!     drop(handle);
//!     registry.shutdown().await;
//! }
//! ```
//!
//! [`DocumentStore`]: crate::store::DocumentStore

pub mod backend;
pub mod executor;
pub mod session;

pub use backend::DocumentShard;
pub use executor::{execute_collection_operation, execute_database_operation};
pub use session::{options_slot, prepare_args_with_session};

use shard_runtime::{ShardHandle, ShardRegistry};

/// Handle to a document shard.
pub type BridgeHandle = ShardHandle<DocumentShard>;

/// Registry of document shards, passed per call.
pub type BridgeRegistry = dyn ShardRegistry<DocumentShard>;
