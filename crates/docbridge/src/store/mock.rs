//! # Recording Store
//!
//! [`MockStore`] is a [`DocumentStore`] that runs no queries. It records every primitive it is
//! asked to run, with the arguments the executor decoded, and answers from a queue of scripted
//! replies per operation. When nothing is scripted for an operation it returns an empty,
//! acknowledged result of the right shape.
//!
//! Clones share their state, so a test keeps one clone for assertions and hands another to
//! the shard:
//!
//! ```rust
//! use docbridge::model::{doc, Bson};
//! use docbridge::protocol::Operation;
//! use docbridge::store::{DocumentStore, MockStore, Namespace};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = MockStore::new();
//! store.expect(Operation::CountDocuments).return_ok(3);
//!
//! let mut shard_side = store.clone();
//! let ns = Namespace::new("app", "users");
//! assert_eq!(shard_side.count_documents(&ns, doc! {}, None).await.unwrap(), 3);
//!
//! let calls = store.calls();
//! assert_eq!(calls[0].operation, Operation::CountDocuments);
//! assert_eq!(calls[0].target, "app.users");
//! store.verify();
//! # }
//! ```
//!
//! Transactions are tracked too: sessions are numbered from 1, and an operation that names a
//! session other than the open one fails the way a real store would.

use super::{DocumentStore, Namespace, Session, StoreError};
use crate::model::{as_integer, count, Bson, Document, ObjectId};
use crate::protocol::{Operation, TransactionOptions};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_DATABASE: &str = "test";

/// One primitive the store was asked to run.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCall {
    pub operation: Operation,
    /// `database.collection` for collection primitives, the database name otherwise.
    pub target: String,
    /// Positional arguments, options excluded.
    pub arguments: Vec<Bson>,
    /// Options with the session removed.
    pub options: Option<Document>,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionEvent {
    Started(Session, TransactionOptions),
    Committed(Session),
    Aborted(Session),
}

#[derive(Debug, Default)]
struct State {
    shard: Option<String>,
    closed: bool,
    calls: Vec<StoreCall>,
    transactions: Vec<TransactionEvent>,
    replies: HashMap<Operation, VecDeque<Result<Bson, StoreError>>>,
    open: Option<Session>,
    next_session: u64,
}

/// A store double that records calls and returns canned results.
#[derive(Debug, Clone)]
pub struct MockStore {
    default_database: String,
    state: Arc<Mutex<State>>,
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStore {
    pub fn new() -> Self {
        Self::with_default_database(DEFAULT_DATABASE)
    }

    pub fn with_default_database(name: impl Into<String>) -> Self {
        Self {
            default_database: name.into(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Scripts the next reply for `operation`. Replies queue up in order.
    pub fn expect(&self, operation: Operation) -> ReplyBuilder {
        ReplyBuilder {
            operation,
            state: self.state.clone(),
        }
    }

    /// Every primitive run so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().calls.clone()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().calls.iter().map(|c| c.operation).collect()
    }

    pub fn transactions(&self) -> Vec<TransactionEvent> {
        self.state.lock().transactions.clone()
    }

    /// Name of the shard that opened this store, once it has started.
    pub fn opened_by(&self) -> Option<String> {
        self.state.lock().shard.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Panics if any scripted reply was never consumed.
    pub fn verify(&self) {
        let remaining: usize = self.state.lock().replies.values().map(VecDeque::len).sum();
        if remaining != 0 {
            panic!("Not all scripted replies were used. {} remaining", remaining);
        }
    }

    /// Records the call and pops its scripted reply, if any.
    fn record(
        &self,
        operation: Operation,
        target: String,
        arguments: Vec<Bson>,
        options: Option<Document>,
    ) -> Result<Option<Bson>, StoreError> {
        let (session, options) = Session::take(options);
        let mut state = self.state.lock();
        debug!(%operation, %target, ?session, "Recording store call");
        state.calls.push(StoreCall {
            operation,
            target,
            arguments,
            options,
            session,
        });
        if let Some(session) = session {
            if state.open != Some(session) {
                return Err(StoreError::Transaction(format!(
                    "session {} is not active",
                    session.id()
                )));
            }
        }
        match state.replies.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(reply) => reply.map(Some),
            None => Ok(None),
        }
    }

    fn take_open(&self, session: Session) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.open != Some(session) {
            return Err(StoreError::Transaction(format!(
                "session {} is not active",
                session.id()
            )));
        }
        state.open = None;
        Ok(())
    }
}

/// Builder for a scripted reply.
pub struct ReplyBuilder {
    operation: Operation,
    state: Arc<Mutex<State>>,
}

impl ReplyBuilder {
    pub fn return_ok(self, reply: impl Into<Bson>) {
        self.push(Ok(reply.into()));
    }

    pub fn return_err(self, error: StoreError) {
        self.push(Err(error));
    }

    fn push(self, reply: Result<Bson, StoreError>) {
        self.state
            .lock()
            .replies
            .entry(self.operation)
            .or_default()
            .push_back(reply);
    }
}

// =============================================================================
// REPLY SHAPING
// =============================================================================

fn wrong_shape(operation: Operation, reply: &Bson) -> StoreError {
    StoreError::Driver(format!(
        "scripted {operation} reply has the wrong shape: {reply}"
    ))
}

fn document(operation: Operation, reply: Bson) -> Result<Document, StoreError> {
    match reply {
        Bson::Document(doc) => Ok(doc),
        other => Err(wrong_shape(operation, &other)),
    }
}

fn optional_document(operation: Operation, reply: Bson) -> Result<Option<Document>, StoreError> {
    match reply {
        Bson::Null => Ok(None),
        other => document(operation, other).map(Some),
    }
}

fn documents(operation: Operation, reply: Bson) -> Result<Vec<Document>, StoreError> {
    match reply {
        Bson::Array(items) => items
            .into_iter()
            .map(|item| document(operation, item))
            .collect(),
        other => Err(wrong_shape(operation, &other)),
    }
}

fn values(operation: Operation, reply: Bson) -> Result<Vec<Bson>, StoreError> {
    match reply {
        Bson::Array(items) => Ok(items),
        other => Err(wrong_shape(operation, &other)),
    }
}

fn boolean(operation: Operation, reply: Bson) -> Result<bool, StoreError> {
    reply
        .as_bool()
        .ok_or_else(|| wrong_shape(operation, &reply))
}

fn acknowledged() -> Document {
    let mut doc = Document::new();
    doc.insert("acknowledged", true);
    doc
}

fn write_result(fields: &[&str]) -> Document {
    let mut doc = acknowledged();
    for field in fields {
        doc.insert(*field, 0);
    }
    doc
}

fn inserted_id(document: &Document) -> Bson {
    document
        .get("_id")
        .cloned()
        .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()))
}

#[async_trait]
impl DocumentStore for MockStore {
    fn default_database(&self) -> &str {
        &self.default_database
    }

    async fn open(&mut self, shard: &str) -> Result<(), StoreError> {
        self.state.lock().shard = Some(shard.to_string());
        Ok(())
    }

    async fn close(&mut self) {
        self.state.lock().closed = true;
    }

    async fn find(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let op = Operation::Find;
        self.record(op, ns.to_string(), vec![filter.into()], options)?
            .map_or(Ok(vec![]), |reply| documents(op, reply))
    }

    async fn find_one(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Option<Document>, StoreError> {
        let op = Operation::FindOne;
        self.record(op, ns.to_string(), vec![filter.into()], options)?
            .map_or(Ok(None), |reply| optional_document(op, reply))
    }

    async fn find_one_and_update(
        &mut self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        options: Option<Document>,
    ) -> Result<Option<Document>, StoreError> {
        let op = Operation::FindOneAndUpdate;
        self.record(op, ns.to_string(), vec![filter.into(), update.into()], options)?
            .map_or(Ok(None), |reply| optional_document(op, reply))
    }

    async fn find_one_and_delete(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Option<Document>, StoreError> {
        let op = Operation::FindOneAndDelete;
        self.record(op, ns.to_string(), vec![filter.into()], options)?
            .map_or(Ok(None), |reply| optional_document(op, reply))
    }

    async fn find_one_and_replace(
        &mut self,
        ns: &Namespace,
        filter: Document,
        replacement: Document,
        options: Option<Document>,
    ) -> Result<Option<Document>, StoreError> {
        let op = Operation::FindOneAndReplace;
        self.record(
            op,
            ns.to_string(),
            vec![filter.into(), replacement.into()],
            options,
        )?
        .map_or(Ok(None), |reply| optional_document(op, reply))
    }

    async fn insert_one(
        &mut self,
        ns: &Namespace,
        document: Document,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let op = Operation::InsertOne;
        let id = inserted_id(&document);
        match self.record(op, ns.to_string(), vec![document.into()], options)? {
            Some(reply) => self::document(op, reply),
            None => {
                let mut result = acknowledged();
                result.insert("insertedId", id);
                Ok(result)
            }
        }
    }

    async fn insert_many(
        &mut self,
        ns: &Namespace,
        documents: Vec<Document>,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let op = Operation::InsertMany;
        let ids: Document = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| (i.to_string(), inserted_id(doc)))
            .collect();
        let inserted = documents.len() as u64;
        match self.record(op, ns.to_string(), vec![documents.into()], options)? {
            Some(reply) => document(op, reply),
            None => {
                let mut result = acknowledged();
                result.insert("insertedCount", count(inserted));
                result.insert("insertedIds", ids);
                Ok(result)
            }
        }
    }

    async fn update_one(
        &mut self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let op = Operation::UpdateOne;
        self.record(op, ns.to_string(), vec![filter.into(), update.into()], options)?
            .map_or_else(
                || Ok(write_result(&["matchedCount", "modifiedCount", "upsertedCount"])),
                |reply| document(op, reply),
            )
    }

    async fn update_many(
        &mut self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let op = Operation::UpdateMany;
        self.record(op, ns.to_string(), vec![filter.into(), update.into()], options)?
            .map_or_else(
                || Ok(write_result(&["matchedCount", "modifiedCount", "upsertedCount"])),
                |reply| document(op, reply),
            )
    }

    async fn delete_one(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let op = Operation::DeleteOne;
        self.record(op, ns.to_string(), vec![filter.into()], options)?
            .map_or_else(
                || Ok(write_result(&["deletedCount"])),
                |reply| document(op, reply),
            )
    }

    async fn delete_many(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let op = Operation::DeleteMany;
        self.record(op, ns.to_string(), vec![filter.into()], options)?
            .map_or_else(
                || Ok(write_result(&["deletedCount"])),
                |reply| document(op, reply),
            )
    }

    async fn aggregate(
        &mut self,
        ns: &Namespace,
        pipeline: Vec<Document>,
        options: Option<Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let op = Operation::Aggregate;
        self.record(op, ns.to_string(), vec![pipeline.into()], options)?
            .map_or(Ok(vec![]), |reply| documents(op, reply))
    }

    async fn distinct(
        &mut self,
        ns: &Namespace,
        key: &str,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Vec<Bson>, StoreError> {
        let op = Operation::Distinct;
        self.record(op, ns.to_string(), vec![key.into(), filter.into()], options)?
            .map_or(Ok(vec![]), |reply| values(op, reply))
    }

    async fn count_documents(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<u64, StoreError> {
        let op = Operation::CountDocuments;
        match self.record(op, ns.to_string(), vec![filter.into()], options)? {
            Some(reply) => as_integer(&reply)
                .and_then(|n| u64::try_from(n).ok())
                .ok_or_else(|| wrong_shape(op, &reply)),
            None => Ok(0),
        }
    }

    async fn list_collections(
        &mut self,
        database: &str,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let op = Operation::ListCollections;
        self.record(op, database.to_string(), vec![filter.into()], options)?
            .map_or(Ok(vec![]), |reply| documents(op, reply))
    }

    async fn create_collection(
        &mut self,
        database: &str,
        name: &str,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let op = Operation::CreateCollection;
        match self.record(op, database.to_string(), vec![name.into()], options)? {
            Some(reply) => document(op, reply),
            None => {
                let mut result = Document::new();
                result.insert("databaseName", database);
                result.insert("collectionName", name);
                Ok(result)
            }
        }
    }

    async fn drop_collection(
        &mut self,
        database: &str,
        name: &str,
        options: Option<Document>,
    ) -> Result<bool, StoreError> {
        let op = Operation::DropCollection;
        self.record(op, database.to_string(), vec![name.into()], options)?
            .map_or(Ok(true), |reply| boolean(op, reply))
    }

    async fn drop_database(
        &mut self,
        database: &str,
        options: Option<Document>,
    ) -> Result<bool, StoreError> {
        let op = Operation::DropDatabase;
        self.record(op, database.to_string(), vec![], options)?
            .map_or(Ok(true), |reply| boolean(op, reply))
    }

    async fn rename_collection(
        &mut self,
        database: &str,
        from: &str,
        to: &str,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let op = Operation::RenameCollection;
        match self.record(op, database.to_string(), vec![from.into(), to.into()], options)? {
            Some(reply) => document(op, reply),
            None => {
                let mut result = Document::new();
                result.insert("databaseName", database);
                result.insert("collectionName", to);
                Ok(result)
            }
        }
    }

    async fn stats(
        &mut self,
        database: &str,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let op = Operation::Stats;
        match self.record(op, database.to_string(), vec![], options)? {
            Some(reply) => document(op, reply),
            None => {
                let mut result = Document::new();
                result.insert("db", database);
                result.insert("collections", 0);
                result.insert("objects", 0);
                Ok(result)
            }
        }
    }

    async fn start_transaction(
        &mut self,
        options: &TransactionOptions,
    ) -> Result<Session, StoreError> {
        let mut state = self.state.lock();
        if let Some(open) = state.open {
            return Err(StoreError::Transaction(format!(
                "session {} is still open",
                open.id()
            )));
        }
        state.next_session += 1;
        let session = Session::new(state.next_session);
        state.open = Some(session);
        state
            .transactions
            .push(TransactionEvent::Started(session, options.clone()));
        Ok(session)
    }

    async fn commit_transaction(&mut self, session: Session) -> Result<(), StoreError> {
        self.take_open(session)?;
        self.state
            .lock()
            .transactions
            .push(TransactionEvent::Committed(session));
        Ok(())
    }

    async fn abort_transaction(&mut self, session: Session) -> Result<(), StoreError> {
        self.take_open(session)?;
        self.state
            .lock()
            .transactions
            .push(TransactionEvent::Aborted(session));
        Ok(())
    }
}
