//! Applies a decoded operation to the document store.
//!
//! Two executors, one per [`Scope`]. Each refuses operations from the other scope with
//! [`BridgeError::UnsupportedOperation`]; the `match` over [`Operation`] is total, so a new
//! operation does not compile until both executors decide what to do with it.

use crate::error::BridgeError;
use crate::model::{count, type_name, Bson, Document};
use crate::protocol::{Operation, Scope};
use crate::store::{DocumentStore, Namespace};
use tracing::debug;

/// Positional view over an argument list.
struct Args {
    operation: Operation,
    values: Vec<Bson>,
}

impl Args {
    fn new(operation: Operation, values: Vec<Bson>) -> Self {
        Self { operation, values }
    }

    fn take(&mut self, index: usize) -> Bson {
        self.values
            .get_mut(index)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    fn invalid(&self, index: usize, expected: &str, found: &Bson) -> BridgeError {
        BridgeError::InvalidArgument(format!(
            "{} argument {index}: expected {expected}, got {}",
            self.operation,
            type_name(found)
        ))
    }

    fn document(&mut self, index: usize) -> Result<Document, BridgeError> {
        match self.take(index) {
            Bson::Document(doc) => Ok(doc),
            other => Err(self.invalid(index, "document", &other)),
        }
    }

    /// Missing or `null` reads as an empty document.
    fn filter(&mut self, index: usize) -> Result<Document, BridgeError> {
        Ok(self.options(index)?.unwrap_or_default())
    }

    /// Missing or `null` reads as absent.
    fn options(&mut self, index: usize) -> Result<Option<Document>, BridgeError> {
        match self.take(index) {
            Bson::Null => Ok(None),
            Bson::Document(doc) => Ok(Some(doc)),
            other => Err(self.invalid(index, "document", &other)),
        }
    }

    fn string(&mut self, index: usize) -> Result<String, BridgeError> {
        match self.take(index) {
            Bson::String(s) => Ok(s),
            other => Err(self.invalid(index, "string", &other)),
        }
    }

    fn documents(&mut self, index: usize) -> Result<Vec<Document>, BridgeError> {
        match self.take(index) {
            Bson::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Bson::Document(doc) => Ok(doc),
                    other => Err(self.invalid(index, "array of documents", &other)),
                })
                .collect(),
            other => Err(self.invalid(index, "array of documents", &other)),
        }
    }
}

fn unsupported(scope: Scope, operation: Operation) -> BridgeError {
    BridgeError::UnsupportedOperation {
        scope: Some(scope),
        operation: operation.to_string(),
    }
}

fn documents(docs: Vec<Document>) -> Bson {
    Bson::Array(docs.into_iter().map(Bson::Document).collect())
}

/// Runs a collection-scoped operation against `ns`.
pub async fn execute_collection_operation(
    store: &mut dyn DocumentStore,
    ns: &Namespace,
    operation: Operation,
    args: Vec<Bson>,
) -> Result<Bson, BridgeError> {
    debug!(namespace = %ns, %operation, "Executing collection operation");
    let mut args = Args::new(operation, args);
    let value = match operation {
        Operation::FindOne => {
            let (filter, options) = (args.filter(0)?, args.options(1)?);
            store.find_one(ns, filter, options).await?.into()
        }
        Operation::Find => {
            let (filter, options) = (args.filter(0)?, args.options(1)?);
            documents(store.find(ns, filter, options).await?)
        }
        Operation::FindOneAndUpdate => {
            let (filter, update, options) = (args.filter(0)?, args.document(1)?, args.options(2)?);
            store
                .find_one_and_update(ns, filter, update, options)
                .await?
                .into()
        }
        Operation::FindOneAndDelete => {
            let (filter, options) = (args.filter(0)?, args.options(1)?);
            store.find_one_and_delete(ns, filter, options).await?.into()
        }
        Operation::FindOneAndReplace => {
            let (filter, replacement, options) =
                (args.filter(0)?, args.document(1)?, args.options(2)?);
            store
                .find_one_and_replace(ns, filter, replacement, options)
                .await?
                .into()
        }
        Operation::InsertOne => {
            let (document, options) = (args.document(0)?, args.options(1)?);
            store.insert_one(ns, document, options).await?.into()
        }
        Operation::InsertMany => {
            let (docs, options) = (args.documents(0)?, args.options(1)?);
            store.insert_many(ns, docs, options).await?.into()
        }
        Operation::UpdateOne => {
            let (filter, update, options) = (args.filter(0)?, args.document(1)?, args.options(2)?);
            store.update_one(ns, filter, update, options).await?.into()
        }
        Operation::UpdateMany => {
            let (filter, update, options) = (args.filter(0)?, args.document(1)?, args.options(2)?);
            store.update_many(ns, filter, update, options).await?.into()
        }
        Operation::DeleteOne => {
            let (filter, options) = (args.filter(0)?, args.options(1)?);
            store.delete_one(ns, filter, options).await?.into()
        }
        Operation::DeleteMany => {
            let (filter, options) = (args.filter(0)?, args.options(1)?);
            store.delete_many(ns, filter, options).await?.into()
        }
        Operation::Aggregate => {
            let (pipeline, options) = (args.documents(0)?, args.options(1)?);
            documents(store.aggregate(ns, pipeline, options).await?)
        }
        Operation::Distinct => {
            let (key, filter, options) = (args.string(0)?, args.filter(1)?, args.options(2)?);
            Bson::Array(store.distinct(ns, &key, filter, options).await?)
        }
        Operation::CountDocuments => {
            let (filter, options) = (args.filter(0)?, args.options(1)?);
            count(store.count_documents(ns, filter, options).await?)
        }
        Operation::ListCollections
        | Operation::CreateCollection
        | Operation::DropCollection
        | Operation::DropDatabase
        | Operation::RenameCollection
        | Operation::Stats => return Err(unsupported(Scope::Collection, operation)),
    };
    Ok(value)
}

/// Runs a database-scoped operation against `database`.
pub async fn execute_database_operation(
    store: &mut dyn DocumentStore,
    database: &str,
    operation: Operation,
    args: Vec<Bson>,
) -> Result<Bson, BridgeError> {
    debug!(database, %operation, "Executing database operation");
    let mut args = Args::new(operation, args);
    let value = match operation {
        Operation::ListCollections => {
            let (filter, options) = (args.filter(0)?, args.options(1)?);
            documents(store.list_collections(database, filter, options).await?)
        }
        Operation::CreateCollection => {
            let (name, options) = (args.string(0)?, args.options(1)?);
            store.create_collection(database, &name, options).await?.into()
        }
        Operation::DropCollection => {
            let (name, options) = (args.string(0)?, args.options(1)?);
            store.drop_collection(database, &name, options).await?.into()
        }
        Operation::DropDatabase => {
            let options = args.options(0)?;
            store.drop_database(database, options).await?.into()
        }
        Operation::RenameCollection => {
            let (from, to, options) = (args.string(0)?, args.string(1)?, args.options(2)?);
            store
                .rename_collection(database, &from, &to, options)
                .await?
                .into()
        }
        Operation::Stats => {
            let options = args.options(0)?;
            store.stats(database, options).await?.into()
        }
        Operation::FindOne
        | Operation::Find
        | Operation::FindOneAndUpdate
        | Operation::FindOneAndDelete
        | Operation::FindOneAndReplace
        | Operation::InsertOne
        | Operation::InsertMany
        | Operation::UpdateOne
        | Operation::UpdateMany
        | Operation::DeleteOne
        | Operation::DeleteMany
        | Operation::Aggregate
        | Operation::Distinct
        | Operation::CountDocuments => return Err(unsupported(Scope::Database, operation)),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::doc;
    use crate::store::{MockStore, StoreError};

    fn ns() -> Namespace {
        Namespace::new("test", "users")
    }

    #[tokio::test]
    async fn test_collection_executor_rejects_database_operations() {
        let mut store = MockStore::new();
        for op in Operation::ALL.into_iter().filter(|op| op.scope() == Scope::Database) {
            let err = execute_collection_operation(&mut store, &ns(), op, vec![])
                .await
                .unwrap_err();
            assert!(
                matches!(err, BridgeError::UnsupportedOperation { scope: Some(Scope::Collection), .. }),
                "{op}"
            );
        }
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_database_executor_rejects_collection_operations() {
        let mut store = MockStore::new();
        for op in Operation::ALL.into_iter().filter(|op| op.scope() == Scope::Collection) {
            let err = execute_database_operation(&mut store, "test", op, vec![])
                .await
                .unwrap_err();
            assert!(
                matches!(err, BridgeError::UnsupportedOperation { scope: Some(Scope::Database), .. }),
                "{op}"
            );
        }
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_positional_arguments() {
        let store = MockStore::new();
        store.expect(Operation::Distinct).return_ok(vec!["a", "b"]);
        store.expect(Operation::CountDocuments).return_ok(3i64);
        let mut shard_side = store.clone();

        let distinct = execute_collection_operation(
            &mut shard_side,
            &ns(),
            Operation::Distinct,
            vec!["k".into(), Bson::Null, doc! { "collation": { "locale": "fr" } }.into()],
        )
        .await
        .unwrap();
        assert_eq!(distinct, Bson::from(vec!["a", "b"]));

        let count = execute_collection_operation(&mut shard_side, &ns(), Operation::CountDocuments, vec![])
            .await
            .unwrap();
        assert_eq!(count, Bson::Int32(3));

        let missing = execute_collection_operation(
            &mut shard_side,
            &ns(),
            Operation::FindOne,
            vec![doc! { "k": "z" }.into()],
        )
        .await
        .unwrap();
        assert_eq!(missing, Bson::Null);

        let calls = store.calls();
        // null filter reads as empty, options pass through untouched
        assert_eq!(
            calls[0].arguments,
            vec![Bson::from("k"), Bson::Document(doc! {})]
        );
        assert_eq!(calls[0].options, Some(doc! { "collation": { "locale": "fr" } }));
        assert_eq!(calls[1].arguments, vec![Bson::Document(doc! {})]);
        assert_eq!(calls[2].arguments, vec![Bson::Document(doc! { "k": "z" })]);
        store.verify();
    }

    #[tokio::test]
    async fn test_wrong_argument_shape_is_invalid() {
        let mut store = MockStore::new();
        let err = execute_collection_operation(
            &mut store,
            &ns(),
            Operation::InsertOne,
            vec![Bson::from("not a document")],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(ref m) if m.contains("insertOne")));

        let err = execute_database_operation(&mut store, "test", Operation::DropCollection, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(_)));

        let err = execute_collection_operation(
            &mut store,
            &ns(),
            Operation::InsertMany,
            vec![Bson::from(vec![Bson::Document(doc! {}), Bson::Int32(1)])],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(ref m) if m.contains("array of documents")));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_database_operations() {
        let store = MockStore::new();
        store
            .expect(Operation::ListCollections)
            .return_ok(vec![doc! { "name": "users", "type": "collection" }]);
        store
            .expect(Operation::CreateCollection)
            .return_err(StoreError::NamespaceExists("app.users".into()));
        let mut shard_side = store.clone();

        let listed = execute_database_operation(&mut shard_side, "app", Operation::ListCollections, vec![])
            .await
            .unwrap();
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        let err = execute_database_operation(
            &mut shard_side,
            "app",
            Operation::CreateCollection,
            vec!["users".into()],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BridgeError::Store(StoreError::NamespaceExists(_))));

        let dropped = execute_database_operation(
            &mut shard_side,
            "app",
            Operation::DropCollection,
            vec!["users".into()],
        )
        .await
        .unwrap();
        assert_eq!(dropped, Bson::Boolean(true));

        let renamed = execute_database_operation(
            &mut shard_side,
            "app",
            Operation::RenameCollection,
            vec!["users".into(), "people".into(), doc! { "dropTarget": true }.into()],
        )
        .await
        .unwrap();
        assert_eq!(renamed, Bson::Document(doc! { "databaseName": "app", "collectionName": "people" }));

        assert_eq!(
            store.operations(),
            vec![
                Operation::ListCollections,
                Operation::CreateCollection,
                Operation::DropCollection,
                Operation::RenameCollection,
            ]
        );
        let rename = &store.calls()[3];
        assert_eq!(rename.target, "app");
        assert_eq!(rename.arguments, vec![Bson::from("users"), Bson::from("people")]);
        assert_eq!(rename.options, Some(doc! { "dropTarget": true }));
    }
}
