//! # Bridge Clients
//!
//! The caller-facing surface. Every entry point takes the shard registry and configuration
//! for the current request, routes once, and returns a proxy bound to the resolved handle.
//! Proxies are meant to live for one request; resolve a new one for the next.
//!
//! ```rust
//! use docbridge::clients::get_collection;
//! use docbridge::config::BridgeConfig;
//! use docbridge::model::doc;
//! use docbridge::protocol::Operation;
//! use docbridge::shard_actor::DocumentShard;
//! use docbridge::store::MockStore;
//! use shard_runtime::LocalRegistry;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = BridgeConfig::default();
//!     let store = MockStore::new();
//!     store.expect(Operation::Find).return_ok(vec![doc! { "name": "ana" }]);
//!     let shared = store.clone();
//!     let registry = LocalRegistry::new(config.mailbox_capacity, move |_name: &str| {
//!         DocumentShard::new(shared.clone())
//!     });
//!
//!     let users = get_collection(&registry, &config, None, "users", Some(&"user-42".into())).unwrap();
//!     users.insert_one(doc! { "name": "ana" }, None).await.unwrap();
//!
//!     let docs = users.find(doc! {}, None).limit(10).to_vec().await.unwrap();
//!     assert_eq!(docs, vec![doc! { "name": "ana" }]);
//!     assert_eq!(store.calls()[1].options, Some(doc! { "limit": 10 }));
//!
//!     registry.shutdown().await;
//! }
//! ```
//!
//! ## Structure
//!
//! - [`collection`] - [`CollectionProxy`], one method per collection operation
//! - [`database`] - [`DatabaseProxy`], database management plus `collection(name)`
//! - [`cursor`] - lazy [`FindCursor`] and [`AggregateCursor`]
//! - [`transaction`] - [`TransactionBatch`] and its result
//! - [`results`] - typed write results

pub mod collection;
pub mod cursor;
pub mod database;
pub mod results;
pub mod transaction;

pub use collection::CollectionProxy;
pub use cursor::{AggregateCursor, FindCursor};
pub use database::DatabaseProxy;
pub use results::{DeleteResult, InsertManyResult, InsertOneResult, UpdateResult};
pub use transaction::{TransactionBatch, TransactionOp, TransactionResult};

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::protocol::dispatch_batch;
use crate::router::{route, ShardKey};
use crate::shard_actor::BridgeRegistry;
use tracing::{debug, instrument};

/// Proxy for `collection` in `database` (the shard's default when `None`), on the shard that
/// serves `shard_key`.
pub fn get_collection(
    registry: &BridgeRegistry,
    config: &BridgeConfig,
    database: Option<&str>,
    collection: &str,
    shard_key: Option<&ShardKey>,
) -> Result<CollectionProxy, BridgeError> {
    let handle = route(registry, config, shard_key)?;
    Ok(CollectionProxy::new(
        database.map(str::to_string),
        collection,
        handle,
    ))
}

/// Proxy for `database` on the shard that serves `shard_key`.
pub fn get_database(
    registry: &BridgeRegistry,
    config: &BridgeConfig,
    database: Option<&str>,
    shard_key: Option<&ShardKey>,
) -> Result<DatabaseProxy, BridgeError> {
    let handle = route(registry, config, shard_key)?;
    Ok(DatabaseProxy::new(database.map(str::to_string), handle))
}

/// Runs `batch` as one transaction on one shard.
///
/// Without a key the shard is picked at random, so a batch only sees data on that shard.
/// An empty batch returns immediately without routing.
#[instrument(skip(registry, config, batch), fields(operations = batch.len()))]
pub async fn run_transaction(
    registry: &BridgeRegistry,
    config: &BridgeConfig,
    batch: TransactionBatch,
    shard_key: Option<&ShardKey>,
) -> Result<TransactionResult, BridgeError> {
    if batch.is_empty() {
        debug!("Empty transaction, nothing to send");
        return Ok(TransactionResult { replies: vec![] });
    }
    let handle = route(registry, config, shard_key)?;
    let (envelopes, options) = batch.into_parts();
    let replies = dispatch_batch(&handle, envelopes, options).await?;
    Ok(TransactionResult { replies })
}
