//! # Document Store Seam
//!
//! The shard talks to its document database only through [`DocumentStore`]. Every primitive
//! takes the same optional options document the caller sent, including the `session` key a
//! transaction injects, so the store decides what each option means.
//!
//! - [`MongoStore`] runs every primitive on a MongoDB deployment through the official driver.
//! - [`MockStore`] records what it was asked and answers with canned results, for tests.

pub mod mock;
pub mod mongo;

pub use mock::{MockStore, StoreCall, TransactionEvent};
pub use mongo::MongoStore;

use crate::model::{as_integer, Bson, Document};
use crate::protocol::TransactionOptions;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Options key that carries a transaction session.
pub const SESSION_KEY: &str = "session";

/// Errors raised by a document store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Collection already exists: {0}")]
    NamespaceExists(String),

    #[error("Collection not found: {0}")]
    NamespaceNotFound(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Store not connected: {0}")]
    NotConnected(String),

    /// Any other failure reported by the database or its driver.
    #[error("Store error: {0}")]
    Driver(String),
}

/// A fully qualified collection name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Correlation token for one store transaction. Travels in options as `{"session": <id>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Session(u64);

impl Session {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }

    pub fn to_value(self) -> Bson {
        Bson::Int64(self.0 as i64)
    }

    /// The session named by an options document, if any.
    pub fn from_options(options: Option<&Document>) -> Option<Self> {
        as_integer(options?.get(SESSION_KEY)?).map(|id| Self(id as u64))
    }

    /// Splits the session out of an options document. Options that held nothing else
    /// become `None`.
    pub fn take(options: Option<Document>) -> (Option<Self>, Option<Document>) {
        let Some(mut options) = options else {
            return (None, None);
        };
        let session = Self::from_options(Some(&options));
        options.remove(SESSION_KEY);
        if options.is_empty() && session.is_some() {
            return (session, None);
        }
        (session, Some(options))
    }
}

/// The document database a shard owns.
///
/// Collection primitives take the target [`Namespace`]; administrative primitives take the
/// database name. Result documents of write primitives use the conventional field names
/// (`insertedId`, `matchedCount`, `deletedCount`, ...).
#[async_trait]
pub trait DocumentStore: Send + 'static {
    /// Database used when an envelope names none.
    fn default_database(&self) -> &str;

    /// Called once when the owning shard starts. A failure keeps the shard from serving.
    async fn open(&mut self, _shard: &str) -> Result<(), StoreError> {
        Ok(())
    }

    /// Called once when the owning shard stops.
    async fn close(&mut self) {}

    // --- collection scope ---

    async fn find(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Vec<Document>, StoreError>;

    async fn find_one(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Option<Document>, StoreError>;

    async fn find_one_and_update(
        &mut self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        options: Option<Document>,
    ) -> Result<Option<Document>, StoreError>;

    async fn find_one_and_delete(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Option<Document>, StoreError>;

    async fn find_one_and_replace(
        &mut self,
        ns: &Namespace,
        filter: Document,
        replacement: Document,
        options: Option<Document>,
    ) -> Result<Option<Document>, StoreError>;

    async fn insert_one(
        &mut self,
        ns: &Namespace,
        document: Document,
        options: Option<Document>,
    ) -> Result<Document, StoreError>;

    async fn insert_many(
        &mut self,
        ns: &Namespace,
        documents: Vec<Document>,
        options: Option<Document>,
    ) -> Result<Document, StoreError>;

    async fn update_one(
        &mut self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        options: Option<Document>,
    ) -> Result<Document, StoreError>;

    async fn update_many(
        &mut self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        options: Option<Document>,
    ) -> Result<Document, StoreError>;

    async fn delete_one(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Document, StoreError>;

    async fn delete_many(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Document, StoreError>;

    async fn aggregate(
        &mut self,
        ns: &Namespace,
        pipeline: Vec<Document>,
        options: Option<Document>,
    ) -> Result<Vec<Document>, StoreError>;

    async fn distinct(
        &mut self,
        ns: &Namespace,
        key: &str,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Vec<Bson>, StoreError>;

    async fn count_documents(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<u64, StoreError>;

    // --- database scope ---

    async fn list_collections(
        &mut self,
        database: &str,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Vec<Document>, StoreError>;

    async fn create_collection(
        &mut self,
        database: &str,
        name: &str,
        options: Option<Document>,
    ) -> Result<Document, StoreError>;

    /// Returns whether the collection existed.
    async fn drop_collection(
        &mut self,
        database: &str,
        name: &str,
        options: Option<Document>,
    ) -> Result<bool, StoreError>;

    async fn drop_database(
        &mut self,
        database: &str,
        options: Option<Document>,
    ) -> Result<bool, StoreError>;

    async fn rename_collection(
        &mut self,
        database: &str,
        from: &str,
        to: &str,
        options: Option<Document>,
    ) -> Result<Document, StoreError>;

    async fn stats(
        &mut self,
        database: &str,
        options: Option<Document>,
    ) -> Result<Document, StoreError>;

    // --- transactions ---

    async fn start_transaction(
        &mut self,
        options: &TransactionOptions,
    ) -> Result<Session, StoreError>;

    async fn commit_transaction(&mut self, session: Session) -> Result<(), StoreError>;

    async fn abort_transaction(&mut self, session: Session) -> Result<(), StoreError>;
}
