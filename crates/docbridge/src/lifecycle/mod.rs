//! # Bridge Lifecycle
//!
//! Starting, wiring and stopping the shards behind the bridge.
//!
//! ## The BridgeSystem Pattern
//!
//! [`BridgeSystem`] owns a [`LocalRegistry`](shard_runtime::LocalRegistry) of
//! [`DocumentShard`](crate::shard_actor::DocumentShard)s plus the [`BridgeConfig`](crate::config::BridgeConfig) that routes
//! into it. Shards start on first use, one store connection each:
//!
//! ```rust,ignore
//! let system = BridgeSystem::connect(BridgeConfig::from_env()?).await?;
//!
//! // Each request resolves fresh proxies
//! let orders = system.collection("orders", Some(&customer_id.into()))?;
//! orders.insert_one(order, None).await?;
//!
//! system.shutdown().await;
//! ```
//!
//! Tests pass their own store factory to [`BridgeSystem::new`] instead.
//!
//! Code that should not depend on the system itself takes the pieces explicitly:
//! `system.registry()` and `system.config()` feed straight into
//! [`get_collection`](crate::clients::get_collection) and friends.
//!
//! ## Graceful Shutdown
//!
//! 1. **`shutdown()`** - the registry raises its stop signal and drops its own senders
//! 2. **Shards drain** - each mailbox is closed, queued requests are answered, then `on_stop`
//!    releases the store
//! 3. **Await completion** - every shard task is joined
//!
//! A proxy kept alive past `shutdown()` does not hold its shard open; its next call fails with
//! a transport error.
//!
//! ## Observability & Tracing
//!
//! [`setup_tracing`] installs the `RUST_LOG`-filtered subscriber; see
//! [`shard_runtime::tracing`] for the fields each layer logs.

pub mod bridge_system;

pub use bridge_system::*;
pub use shard_runtime::tracing::setup_tracing;
