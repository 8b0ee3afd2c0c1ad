//! # Transaction Batches
//!
//! A [`TransactionBatch`] is an ordered list of collection operations that one shard runs
//! inside a single store transaction. Either every operation takes effect or none does.
//!
//! Operations are sent in one batch invocation; the shard injects its session into each
//! operation's options before running it. `deleteMany` has no fixed options position, so the
//! builder always sends it an explicit options document for the session to land in.

use crate::error::BridgeError;
use crate::model::{Bson, Document};
use crate::protocol::{Envelope, Operation, TransactionOptions};

/// One operation in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOp {
    pub collection: String,
    pub operation: Operation,
    pub args: Vec<Bson>,
}

/// Ordered operations plus the options the transaction is started with.
#[derive(Debug, Clone, Default)]
pub struct TransactionBatch {
    database: Option<String>,
    ops: Vec<TransactionOp>,
    options: TransactionOptions,
}

impl TransactionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every operation in `database` instead of the shard's default.
    pub fn in_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_options(mut self, options: TransactionOptions) -> Self {
        self.options = options;
        self
    }

    /// Appends an operation with raw positional arguments. Database-scoped operations are
    /// rejected by the shard and fail the whole batch.
    pub fn push(
        mut self,
        collection: impl Into<String>,
        operation: Operation,
        args: Vec<Bson>,
    ) -> Self {
        self.ops.push(TransactionOp {
            collection: collection.into(),
            operation,
            args,
        });
        self
    }

    pub fn insert_one(self, collection: impl Into<String>, document: Document) -> Self {
        self.push(collection, Operation::InsertOne, vec![document.into()])
    }

    pub fn insert_many(self, collection: impl Into<String>, documents: Vec<Document>) -> Self {
        self.push(collection, Operation::InsertMany, vec![documents.into()])
    }

    pub fn update_one(self, collection: impl Into<String>, filter: Document, update: Document) -> Self {
        self.push(
            collection,
            Operation::UpdateOne,
            vec![filter.into(), update.into()],
        )
    }

    pub fn update_many(
        self,
        collection: impl Into<String>,
        filter: Document,
        update: Document,
    ) -> Self {
        self.push(
            collection,
            Operation::UpdateMany,
            vec![filter.into(), update.into()],
        )
    }

    pub fn delete_one(self, collection: impl Into<String>, filter: Document) -> Self {
        self.push(collection, Operation::DeleteOne, vec![filter.into()])
    }

    pub fn delete_many(self, collection: impl Into<String>, filter: Document) -> Self {
        self.push(
            collection,
            Operation::DeleteMany,
            vec![filter.into(), Document::new().into()],
        )
    }

    pub fn find_one_and_update(
        self,
        collection: impl Into<String>,
        filter: Document,
        update: Document,
    ) -> Self {
        self.push(
            collection,
            Operation::FindOneAndUpdate,
            vec![filter.into(), update.into()],
        )
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn operations(&self) -> &[TransactionOp] {
        &self.ops
    }

    pub fn options(&self) -> &TransactionOptions {
        &self.options
    }

    pub(crate) fn into_parts(self) -> (Vec<Envelope>, TransactionOptions) {
        let database = self.database;
        let envelopes = self
            .ops
            .into_iter()
            .map(|op| {
                Envelope::collection(database.as_deref(), &op.collection, op.operation, &op.args)
            })
            .collect();
        (envelopes, self.options)
    }
}

/// Replies of a committed batch, one per operation, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionResult {
    pub replies: Vec<Bson>,
}

impl TransactionResult {
    pub fn len(&self) -> usize {
        self.replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }

    /// Reply of the operation at `index`, shaped as `T`.
    pub fn get<T>(&self, index: usize) -> Result<T, BridgeError>
    where
        T: TryFrom<Bson, Error = BridgeError>,
    {
        let reply = self
            .replies
            .get(index)
            .cloned()
            .ok_or_else(|| BridgeError::Protocol(format!("no reply at position {index}")))?;
        T::try_from(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::doc;
    use crate::clients::results::InsertOneResult;

    #[test]
    fn test_envelopes_keep_order_and_database() {
        let batch = TransactionBatch::new()
            .in_database("bank")
            .update_one(
                "accounts",
                doc! { "_id": 1 },
                doc! { "$inc": { "balance": -10 } },
            )
            .update_one(
                "accounts",
                doc! { "_id": 2 },
                doc! { "$inc": { "balance": 10 } },
            )
            .delete_many("holds", doc! { "account": 1 });
        assert_eq!(batch.len(), 3);

        let (envelopes, options) = batch.into_parts();
        assert_eq!(options, TransactionOptions::default());
        assert!(envelopes
            .iter()
            .all(|e| e.database_name.as_deref() == Some("bank")));
        assert_eq!(
            envelopes.iter().map(|e| e.operation).collect::<Vec<_>>(),
            vec![Operation::UpdateOne, Operation::UpdateOne, Operation::DeleteMany]
        );
        // deleteMany always carries an options document
        assert_eq!(envelopes[2].arguments.len(), 2);
    }

    #[test]
    fn test_result_positions() {
        let result = TransactionResult {
            replies: vec![Bson::from(doc! { "acknowledged": true, "insertedId": 5 })],
        };
        let first: InsertOneResult = result.get(0).unwrap();
        assert_eq!(first.inserted_id, Bson::Int32(5));
        assert!(matches!(
            result.get::<InsertOneResult>(1),
            Err(BridgeError::Protocol(_))
        ));
    }
}
