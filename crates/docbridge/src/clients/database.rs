//! # Database Proxy
//!
//! Database-scoped operations. Envelopes carry no collection name, so the shard runs them
//! against the database itself.

use crate::clients::collection::CollectionProxy;
use crate::clients::results;
use crate::error::BridgeError;
use crate::model::{Bson, Document};
use crate::protocol::{dispatch, Envelope, Operation};
use crate::shard_actor::BridgeHandle;
use tracing::instrument;

/// Caller-side stand-in for one database on one shard.
#[derive(Debug, Clone)]
pub struct DatabaseProxy {
    name: Option<String>,
    handle: BridgeHandle,
}

impl DatabaseProxy {
    pub(crate) fn new(name: Option<String>, handle: BridgeHandle) -> Self {
        Self { name, handle }
    }

    /// `None` means the shard's default database.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn shard(&self) -> &str {
        self.handle.name()
    }

    /// A collection in this database, served by the same shard.
    pub fn collection(&self, name: &str) -> CollectionProxy {
        CollectionProxy::new(self.name.clone(), name, self.handle.clone())
    }

    #[instrument(skip(self, args), fields(database = self.name(), shard = %self.handle.name()))]
    async fn call(&self, operation: Operation, args: Vec<Bson>) -> Result<Bson, BridgeError> {
        let envelope = Envelope::database(self.name.as_deref(), operation, &args);
        dispatch(&self.handle, envelope).await
    }

    pub async fn list_collections(
        &self,
        filter: Option<Document>,
        options: Option<Document>,
    ) -> Result<Vec<Document>, BridgeError> {
        let reply = self
            .call(Operation::ListCollections, vec![filter.into(), options.into()])
            .await?;
        results::into_documents(reply)
    }

    pub async fn create_collection(
        &self,
        name: &str,
        options: Option<Document>,
    ) -> Result<Document, BridgeError> {
        let reply = self
            .call(Operation::CreateCollection, vec![name.into(), options.into()])
            .await?;
        results::into_document(reply)
    }

    /// `false` when there was no such collection.
    pub async fn drop_collection(&self, name: &str) -> Result<bool, BridgeError> {
        let reply = self
            .call(Operation::DropCollection, vec![name.into()])
            .await?;
        results::into_bool(reply)
    }

    pub async fn drop_database(&self) -> Result<bool, BridgeError> {
        let reply = self.call(Operation::DropDatabase, vec![]).await?;
        results::into_bool(reply)
    }

    pub async fn rename_collection(
        &self,
        from: &str,
        to: &str,
        options: Option<Document>,
    ) -> Result<Document, BridgeError> {
        let reply = self
            .call(
                Operation::RenameCollection,
                vec![from.into(), to.into(), options.into()],
            )
            .await?;
        results::into_document(reply)
    }

    pub async fn stats(&self, options: Option<Document>) -> Result<Document, BridgeError> {
        let reply = self.call(Operation::Stats, vec![options.into()]).await?;
        results::into_document(reply)
    }
}
