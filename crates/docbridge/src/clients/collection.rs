//! # Collection Proxy
//!
//! Mirrors the collection surface of the document store. Each method builds one envelope,
//! dispatches it to the shard this proxy was routed to, and shapes the reply.
//!
//! `find` and `aggregate` are the exception: they return a cursor without contacting the shard.
//! See [`cursor`](crate::clients::cursor).

use crate::clients::cursor::{AggregateCursor, FindCursor};
use crate::clients::results::{
    self, DeleteResult, InsertManyResult, InsertOneResult, UpdateResult,
};
use crate::error::BridgeError;
use crate::model::{Bson, Document};
use crate::protocol::{dispatch, Envelope, Operation};
use crate::shard_actor::BridgeHandle;
use tracing::instrument;

/// Caller-side stand-in for one collection on one shard.
#[derive(Debug, Clone)]
pub struct CollectionProxy {
    database: Option<String>,
    name: String,
    handle: BridgeHandle,
}

impl CollectionProxy {
    pub(crate) fn new(database: Option<String>, name: impl Into<String>, handle: BridgeHandle) -> Self {
        Self {
            database,
            name: name.into(),
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Database this proxy targets; `None` means the shard's default database.
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Instance name of the shard this proxy was routed to.
    pub fn shard(&self) -> &str {
        self.handle.name()
    }

    #[instrument(skip(self, args), fields(collection = %self.name, shard = %self.handle.name()))]
    pub(crate) async fn call(&self, operation: Operation, args: Vec<Bson>) -> Result<Bson, BridgeError> {
        let envelope = Envelope::collection(self.database.as_deref(), &self.name, operation, &args);
        dispatch(&self.handle, envelope).await
    }

    pub async fn find_one(
        &self,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Option<Document>, BridgeError> {
        let reply = self
            .call(Operation::FindOne, vec![filter.into(), options.into()])
            .await?;
        results::into_optional_document(reply)
    }

    /// Returns a lazy cursor. Nothing is sent until a terminal method runs.
    pub fn find(&self, filter: Document, options: Option<Document>) -> FindCursor {
        FindCursor::new(self.clone(), filter, options)
    }

    pub async fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: Option<Document>,
    ) -> Result<Option<Document>, BridgeError> {
        let reply = self
            .call(
                Operation::FindOneAndUpdate,
                vec![filter.into(), update.into(), options.into()],
            )
            .await?;
        results::into_optional_document(reply)
    }

    pub async fn find_one_and_delete(
        &self,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Option<Document>, BridgeError> {
        let reply = self
            .call(Operation::FindOneAndDelete, vec![filter.into(), options.into()])
            .await?;
        results::into_optional_document(reply)
    }

    pub async fn find_one_and_replace(
        &self,
        filter: Document,
        replacement: Document,
        options: Option<Document>,
    ) -> Result<Option<Document>, BridgeError> {
        let reply = self
            .call(
                Operation::FindOneAndReplace,
                vec![filter.into(), replacement.into(), options.into()],
            )
            .await?;
        results::into_optional_document(reply)
    }

    pub async fn insert_one(
        &self,
        document: Document,
        options: Option<Document>,
    ) -> Result<InsertOneResult, BridgeError> {
        self.call(Operation::InsertOne, vec![document.into(), options.into()])
            .await?
            .try_into()
    }

    pub async fn insert_many(
        &self,
        documents: Vec<Document>,
        options: Option<Document>,
    ) -> Result<InsertManyResult, BridgeError> {
        self.call(Operation::InsertMany, vec![documents.into(), options.into()])
            .await?
            .try_into()
    }

    pub async fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: Option<Document>,
    ) -> Result<UpdateResult, BridgeError> {
        self.call(
            Operation::UpdateOne,
            vec![filter.into(), update.into(), options.into()],
        )
        .await?
        .try_into()
    }

    pub async fn update_many(
        &self,
        filter: Document,
        update: Document,
        options: Option<Document>,
    ) -> Result<UpdateResult, BridgeError> {
        self.call(
            Operation::UpdateMany,
            vec![filter.into(), update.into(), options.into()],
        )
        .await?
        .try_into()
    }

    pub async fn delete_one(
        &self,
        filter: Document,
        options: Option<Document>,
    ) -> Result<DeleteResult, BridgeError> {
        self.call(Operation::DeleteOne, vec![filter.into(), options.into()])
            .await?
            .try_into()
    }

    pub async fn delete_many(
        &self,
        filter: Document,
        options: Option<Document>,
    ) -> Result<DeleteResult, BridgeError> {
        self.call(Operation::DeleteMany, vec![filter.into(), options.into()])
            .await?
            .try_into()
    }

    /// Returns a lazy cursor over the pipeline's output.
    pub fn aggregate(&self, pipeline: Vec<Document>, options: Option<Document>) -> AggregateCursor {
        AggregateCursor::new(self.clone(), pipeline, options)
    }

    pub async fn distinct(
        &self,
        key: &str,
        filter: Option<Document>,
        options: Option<Document>,
    ) -> Result<Vec<Bson>, BridgeError> {
        let reply = self
            .call(
                Operation::Distinct,
                vec![key.into(), filter.into(), options.into()],
            )
            .await?;
        results::into_values(reply)
    }

    pub async fn count_documents(
        &self,
        filter: Document,
        options: Option<Document>,
    ) -> Result<u64, BridgeError> {
        let reply = self
            .call(Operation::CountDocuments, vec![filter.into(), options.into()])
            .await?;
        results::into_count(reply)
    }
}
