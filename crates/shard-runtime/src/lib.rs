//! # Shard Runtime
//!
//! This crate provides the building blocks for hosting a long-lived resource (typically a
//! database connection) inside a small, fixed set of single-threaded actors called *shards*,
//! and for reaching those shards from short-lived, stateless callers.
//!
//! ## Why shards?
//!
//! Callers such as request handlers come and go; they cannot keep a connection open. A shard
//! can. Each shard owns its backend exclusively and processes one message at a time, so:
//!
//! - **Isolation**: the backend is never shared, never locked, never seen by callers
//! - **Serialization**: everything routed to one shard is applied in mailbox order
//! - **Parallelism**: different shards are different Tokio tasks
//!
//! **Further Reading**:
//! - [Actors in Rust](https://ryhl.io/blog/actors-with-tokio/) - Practical guide to implementing actors with Tokio
//!
//! ## Architecture Overview
//!
//! 1. **Backend Layer** ([`ShardBackend`]) - the owned resource and what it does with a request
//! 2. **Runtime Layer** ([`ShardActor`]) - mailbox loop and error boxing
//! 3. **Interface Layer** ([`ShardHandle`]) - one call-and-response per request
//! 4. **Directory Layer** ([`ShardRegistry`]) - stable instance name to fresh handle
//!
//! ```rust
//! use shard_runtime::{LocalRegistry, ShardBackend, ShardRegistry};
//! use async_trait::async_trait;
//!
//! struct Tally { count: u64 }
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("tally error")]
//! struct TallyError;
//!
//! #[async_trait]
//! impl ShardBackend for Tally {
//!     type Request = u64;
//!     type Reply = u64;
//!     type BatchOptions = ();
//!     type Error = TallyError;
//!
//!     async fn execute(&mut self, n: u64) -> Result<u64, TallyError> {
//!         self.count += n;
//!         Ok(self.count)
//!     }
//!
//!     async fn execute_batch(&mut self, ns: Vec<u64>, _: ()) -> Result<Vec<u64>, TallyError> {
//!         let mut out = Vec::with_capacity(ns.len());
//!         for n in ns {
//!             out.push(self.execute(n).await?);
//!         }
//!         Ok(out)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = LocalRegistry::new(16, |_name: &str| Tally { count: 0 });
//!
//!     // A fresh handle per call; the shard itself lives on in the registry.
//!     registry.resolve("tally_0").unwrap().execute(2).await.unwrap();
//!     let total = registry.resolve("tally_0").unwrap().execute(3).await.unwrap();
//!     assert_eq!(total, 5);
//!
//!     registry.shutdown().await;
//! }
//! ```
//!
//! ## Testing
//!
//! The [`mock`] module provides [`MockShard`](mock::MockShard) and
//! [`MockRegistry`](mock::MockRegistry) for testing callers without a real backend.

pub mod actor;
pub mod backend;
pub mod client;
pub mod error;
pub mod message;
pub mod mock;
pub mod registry;
pub mod tracing;

// Re-export core types for convenience
pub use actor::ShardActor;
pub use backend::ShardBackend;
pub use client::ShardHandle;
pub use error::ShardError;
pub use message::{Response, ShardRequest};
pub use registry::{LocalRegistry, ShardRegistry};
