//! # Observability & Tracing
//!
//! Every shard logs with the `tracing` crate using structured fields (`shard`, `size`,
//! `error`), and callers add their own (`operation`, `collection`, `database`).
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run     # Shard lifecycle and batch outcomes
//! RUST_LOG=debug cargo run    # Every request payload
//! RUST_LOG=shard_runtime=debug,docbridge=info cargo run
//! ```
//!
//! With `RUST_LOG=debug` a single dispatch reads:
//!
//! ```text
//! DEBUG find_one: Sending request operation=findOne collection="users"
//! DEBUG Execute shard="mongo_shard_1" request=Object {"collectionName": String("users"), ...}
//! DEBUG Execute ok shard="mongo_shard_1"
//! ```

/// Initializes the tracing subscriber with `RUST_LOG` filtering and the compact format.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
