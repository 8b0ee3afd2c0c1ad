//! # Envelope Protocol
//!
//! A caller turns one operation into an [`Envelope`] (operation name, encoded arguments,
//! optional database and collection names), sends it over a shard handle with [`dispatch`],
//! and decodes the reply. A transaction sends several envelopes at once with
//! [`dispatch_batch`].
//!
//! On the wire:
//!
//! ```json
//! { "databaseName": "app", "collectionName": "users", "operation": "findOne",
//!   "arguments": [ { "_id": { "$oid": "507f1f77bcf86cd799439011" } } ] }
//! ```

pub mod dispatch;
pub mod envelope;
pub mod operation;

pub use dispatch::{dispatch, dispatch_batch};
pub use envelope::{Envelope, TransactionOptions};
pub use operation::{Operation, Scope};
