//! # docbridge
//!
//! A document-database RPC bridge. Short-lived callers hand document operations to a small set
//! of long-lived shards, each the sole owner of a store connection. Every call crosses the
//! boundary as a JSON envelope, with object ids, dates and binary values carried in a
//! self-describing form.
//!
//! ## Layers
//!
//! - [`model`] - native values, the `bson` crate's [`Document`](model::Document),
//!   [`Bson`](model::Bson) and [`ObjectId`](model::ObjectId)
//! - [`codec`] - lossless JSON-safe encoding of native values
//! - [`protocol`] - the envelope, the closed operation set and dispatch
//! - [`router`] - shard key to shard instance
//! - [`config`] - shard count, name prefix, mailbox capacity, deployment URI
//! - [`clients`] - collection/database proxies, lazy cursors, transaction batches
//! - [`shard_actor`] - the shard: executors, session injection, the runtime backend
//! - [`store`] - the `DocumentStore` seam, the MongoDB store and a recording test store
//! - [`lifecycle`] - [`BridgeSystem`](lifecycle::BridgeSystem), wiring it all together
//! - [`error`] - [`BridgeError`](error::BridgeError)

pub mod clients;
pub mod codec;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod protocol;
pub mod router;
pub mod shard_actor;
pub mod store;

pub use clients::{get_collection, get_database, run_transaction};
pub use error::BridgeError;
pub use router::ShardKey;
