//! [`DocumentStore`] over a MongoDB deployment, through the official driver.
//!
//! Options documents are deserialized into the driver's option types after the `session` key
//! is split out, so callers use the driver's camel-case option names (`sort`, `projection`,
//! `upsert`, `returnDocument`, ...). Administrative primitives go through `runCommand` and
//! merge the options into the command document.
//!
//! A transaction holds one driver session. Operations whose options name that session run on
//! it; naming any other session is a [`StoreError::Transaction`].

use super::{DocumentStore, Namespace, Session, StoreError};
use crate::model::{count, doc, Bson, Document};
use crate::protocol::TransactionOptions;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::error::{Error as DriverError, ErrorKind, WriteFailure};
use mongodb::options::{
    Acknowledgment, AggregateOptions, ClientOptions, CountOptions, DeleteOptions,
    DistinctOptions, FindOneAndDeleteOptions, FindOneAndReplaceOptions, FindOneAndUpdateOptions,
    FindOneOptions, FindOptions, InsertManyOptions, InsertOneOptions, ReadConcern,
    TransactionOptions as DriverTransactionOptions, UpdateOptions, WriteConcern,
};
use mongodb::{Client, ClientSession, Collection, Database};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

const DUPLICATE_KEY: i32 = 11000;
const NAMESPACE_EXISTS: i32 = 48;
const NAMESPACE_NOT_FOUND: i32 = 26;

pub struct MongoStore {
    options: ClientOptions,
    default_database: String,
    client: Option<Client>,
    active: Option<(Session, ClientSession)>,
    next_session: u64,
}

impl MongoStore {
    /// Connects lazily: the client is built when the owning shard starts.
    pub fn new(options: ClientOptions, default_database: impl Into<String>) -> Self {
        Self {
            options,
            default_database: default_database.into(),
            client: None,
            active: None,
            next_session: 0,
        }
    }

    fn client(&self) -> Result<&Client, StoreError> {
        self.client
            .as_ref()
            .ok_or_else(|| StoreError::NotConnected(self.default_database.clone()))
    }

    fn database(&self, name: &str) -> Result<Database, StoreError> {
        Ok(self.client()?.database(name))
    }

    fn collection(&self, ns: &Namespace) -> Result<Collection<Document>, StoreError> {
        Ok(self.database(&ns.database)?.collection(&ns.collection))
    }

    /// The driver session for `session`, when the options named one.
    fn session(&mut self, session: Option<Session>) -> Result<Option<&mut ClientSession>, StoreError> {
        let Some(session) = session else {
            return Ok(None);
        };
        match &mut self.active {
            Some((active, driver)) if *active == session => Ok(Some(driver)),
            _ => Err(inactive(session)),
        }
    }

    /// Runs `command` (merged with `options`) on `database`, inside the named session if any.
    async fn run_command(
        &mut self,
        database: &str,
        mut command: Document,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let (session, options) = Session::take(options);
        command.extend(options.unwrap_or_default());
        let db = self.database(database)?;
        debug!(database, ?command, "Running command");
        let reply = match self.session(session)? {
            Some(s) => db.run_command_with_session(command, None, s).await?,
            None => db.run_command(command, None).await?,
        };
        Ok(reply)
    }
}

fn inactive(session: Session) -> StoreError {
    StoreError::Transaction(format!("session {} is not active", session.id()))
}

/// Splits the session out and reads the rest as driver options.
fn parse<T: DeserializeOwned>(options: Option<Document>) -> Result<(Option<Session>, Option<T>), StoreError> {
    let (session, options) = Session::take(options);
    let options = options
        .map(bson::from_document)
        .transpose()
        .map_err(|e| StoreError::InvalidOptions(e.to_string()))?;
    Ok((session, options))
}

fn acknowledged() -> Document {
    doc! { "acknowledged": true }
}

fn transaction_options(options: &TransactionOptions) -> Result<DriverTransactionOptions, StoreError> {
    let mut driver = DriverTransactionOptions::default();
    if let Some(level) = &options.read_concern {
        driver.read_concern = Some(match level.as_str() {
            "local" => ReadConcern::local(),
            "majority" => ReadConcern::majority(),
            "snapshot" => ReadConcern::snapshot(),
            "linearizable" => ReadConcern::linearizable(),
            "available" => ReadConcern::available(),
            other => {
                return Err(StoreError::InvalidOptions(format!(
                    "unknown read concern {other:?}"
                )))
            }
        });
    }
    if let Some(w) = &options.write_concern {
        let mut concern = WriteConcern::default();
        concern.w = Some(match w.parse::<u32>() {
            Ok(nodes) => Acknowledgment::Nodes(nodes),
            Err(_) => Acknowledgment::from(w.clone()),
        });
        driver.write_concern = Some(concern);
    }
    driver.max_commit_time = options.max_commit_time_ms.map(Duration::from_millis);
    Ok(driver)
}

fn error_code(error: &DriverError) -> Option<i32> {
    match error.kind.as_ref() {
        ErrorKind::Command(command) => Some(command.code),
        ErrorKind::Write(WriteFailure::WriteError(write)) => Some(write.code),
        ErrorKind::BulkWrite(bulk) => bulk
            .write_errors
            .as_ref()
            .and_then(|errors| errors.first())
            .map(|write| write.code),
        _ => None,
    }
}

impl From<DriverError> for StoreError {
    fn from(error: DriverError) -> Self {
        let message = error.to_string();
        match error_code(&error) {
            Some(DUPLICATE_KEY) => StoreError::DuplicateKey(message),
            Some(NAMESPACE_EXISTS) => StoreError::NamespaceExists(message),
            Some(NAMESPACE_NOT_FOUND) => StoreError::NamespaceNotFound(message),
            _ => StoreError::Driver(message),
        }
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn default_database(&self) -> &str {
        &self.default_database
    }

    async fn open(&mut self, shard: &str) -> Result<(), StoreError> {
        let client = Client::with_options(self.options.clone())?;
        info!(shard, hosts = ?self.options.hosts, "Connected document store");
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some((session, mut driver)) = self.active.take() {
            if driver.abort_transaction().await.is_err() {
                debug!(session = session.id(), "Open transaction dropped on close");
            }
        }
        if let Some(client) = self.client.take() {
            client.shutdown().await;
        }
    }

    async fn find(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let (session, options): (_, Option<FindOptions>) = parse(options)?;
        let coll = self.collection(ns)?;
        let docs: Vec<Document> = match self.session(session)? {
            Some(s) => {
                let mut cursor = coll.find_with_session(filter, options, s).await?;
                let mut docs = Vec::new();
                while let Some(doc) = cursor.next(s).await {
                    docs.push(doc?);
                }
                docs
            }
            None => coll.find(filter, options).await?.try_collect().await?,
        };
        Ok(docs)
    }

    async fn find_one(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Option<Document>, StoreError> {
        let (session, options): (_, Option<FindOneOptions>) = parse(options)?;
        let coll = self.collection(ns)?;
        Ok(match self.session(session)? {
            Some(s) => coll.find_one_with_session(filter, options, s).await?,
            None => coll.find_one(filter, options).await?,
        })
    }

    async fn find_one_and_update(
        &mut self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        options: Option<Document>,
    ) -> Result<Option<Document>, StoreError> {
        let (session, options): (_, Option<FindOneAndUpdateOptions>) = parse(options)?;
        let coll = self.collection(ns)?;
        Ok(match self.session(session)? {
            Some(s) => {
                coll.find_one_and_update_with_session(filter, update, options, s)
                    .await?
            }
            None => coll.find_one_and_update(filter, update, options).await?,
        })
    }

    async fn find_one_and_delete(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Option<Document>, StoreError> {
        let (session, options): (_, Option<FindOneAndDeleteOptions>) = parse(options)?;
        let coll = self.collection(ns)?;
        Ok(match self.session(session)? {
            Some(s) => coll.find_one_and_delete_with_session(filter, options, s).await?,
            None => coll.find_one_and_delete(filter, options).await?,
        })
    }

    async fn find_one_and_replace(
        &mut self,
        ns: &Namespace,
        filter: Document,
        replacement: Document,
        options: Option<Document>,
    ) -> Result<Option<Document>, StoreError> {
        let (session, options): (_, Option<FindOneAndReplaceOptions>) = parse(options)?;
        let coll = self.collection(ns)?;
        Ok(match self.session(session)? {
            Some(s) => {
                coll.find_one_and_replace_with_session(filter, replacement, options, s)
                    .await?
            }
            None => coll.find_one_and_replace(filter, replacement, options).await?,
        })
    }

    async fn insert_one(
        &mut self,
        ns: &Namespace,
        document: Document,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let (session, options): (_, Option<InsertOneOptions>) = parse(options)?;
        let coll = self.collection(ns)?;
        let result = match self.session(session)? {
            Some(s) => coll.insert_one_with_session(document, options, s).await?,
            None => coll.insert_one(document, options).await?,
        };
        let mut reply = acknowledged();
        reply.insert("insertedId", result.inserted_id);
        Ok(reply)
    }

    async fn insert_many(
        &mut self,
        ns: &Namespace,
        documents: Vec<Document>,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let (session, options): (_, Option<InsertManyOptions>) = parse(options)?;
        let coll = self.collection(ns)?;
        let result = match self.session(session)? {
            Some(s) => coll.insert_many_with_session(documents, options, s).await?,
            None => coll.insert_many(documents, options).await?,
        };
        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(index, _)| *index);
        let inserted = ids.len() as u64;
        let ids: Document = ids
            .into_iter()
            .map(|(index, id)| (index.to_string(), id))
            .collect();

        let mut reply = acknowledged();
        reply.insert("insertedCount", count(inserted));
        reply.insert("insertedIds", ids);
        Ok(reply)
    }

    async fn update_one(
        &mut self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let (session, options): (_, Option<UpdateOptions>) = parse(options)?;
        let coll = self.collection(ns)?;
        let result = match self.session(session)? {
            Some(s) => coll.update_one_with_session(filter, update, options, s).await?,
            None => coll.update_one(filter, update, options).await?,
        };
        Ok(update_reply(result))
    }

    async fn update_many(
        &mut self,
        ns: &Namespace,
        filter: Document,
        update: Document,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let (session, options): (_, Option<UpdateOptions>) = parse(options)?;
        let coll = self.collection(ns)?;
        let result = match self.session(session)? {
            Some(s) => coll.update_many_with_session(filter, update, options, s).await?,
            None => coll.update_many(filter, update, options).await?,
        };
        Ok(update_reply(result))
    }

    async fn delete_one(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let (session, options): (_, Option<DeleteOptions>) = parse(options)?;
        let coll = self.collection(ns)?;
        let result = match self.session(session)? {
            Some(s) => coll.delete_one_with_session(filter, options, s).await?,
            None => coll.delete_one(filter, options).await?,
        };
        let mut reply = acknowledged();
        reply.insert("deletedCount", count(result.deleted_count));
        Ok(reply)
    }

    async fn delete_many(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let (session, options): (_, Option<DeleteOptions>) = parse(options)?;
        let coll = self.collection(ns)?;
        let result = match self.session(session)? {
            Some(s) => coll.delete_many_with_session(filter, options, s).await?,
            None => coll.delete_many(filter, options).await?,
        };
        let mut reply = acknowledged();
        reply.insert("deletedCount", count(result.deleted_count));
        Ok(reply)
    }

    async fn aggregate(
        &mut self,
        ns: &Namespace,
        pipeline: Vec<Document>,
        options: Option<Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let (session, options): (_, Option<AggregateOptions>) = parse(options)?;
        let coll = self.collection(ns)?;
        let docs: Vec<Document> = match self.session(session)? {
            Some(s) => {
                let mut cursor = coll.aggregate_with_session(pipeline, options, s).await?;
                let mut docs = Vec::new();
                while let Some(doc) = cursor.next(s).await {
                    docs.push(doc?);
                }
                docs
            }
            None => coll.aggregate(pipeline, options).await?.try_collect().await?,
        };
        Ok(docs)
    }

    async fn distinct(
        &mut self,
        ns: &Namespace,
        key: &str,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Vec<Bson>, StoreError> {
        let (session, options): (_, Option<DistinctOptions>) = parse(options)?;
        let coll = self.collection(ns)?;
        Ok(match self.session(session)? {
            Some(s) => coll.distinct_with_session(key, filter, options, s).await?,
            None => coll.distinct(key, filter, options).await?,
        })
    }

    async fn count_documents(
        &mut self,
        ns: &Namespace,
        filter: Document,
        options: Option<Document>,
    ) -> Result<u64, StoreError> {
        let (session, options): (_, Option<CountOptions>) = parse(options)?;
        let coll = self.collection(ns)?;
        Ok(match self.session(session)? {
            Some(s) => coll.count_documents_with_session(filter, options, s).await?,
            None => coll.count_documents(filter, options).await?,
        })
    }

    /// Only the first batch of the listing cursor is returned.
    async fn list_collections(
        &mut self,
        database: &str,
        filter: Document,
        options: Option<Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let reply = self
            .run_command(database, doc! { "listCollections": 1, "filter": filter }, options)
            .await?;
        let batch = reply
            .get_document("cursor")
            .and_then(|cursor| cursor.get_array("firstBatch"))
            .map_err(|e| StoreError::Driver(format!("listCollections reply: {e}")))?;
        batch
            .iter()
            .map(|entry| match entry {
                Bson::Document(doc) => Ok(doc.clone()),
                other => Err(StoreError::Driver(format!(
                    "listCollections entry is not a document: {other}"
                ))),
            })
            .collect()
    }

    async fn create_collection(
        &mut self,
        database: &str,
        name: &str,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        self.run_command(database, doc! { "create": name }, options)
            .await?;
        Ok(doc! { "databaseName": database, "collectionName": name })
    }

    async fn drop_collection(
        &mut self,
        database: &str,
        name: &str,
        options: Option<Document>,
    ) -> Result<bool, StoreError> {
        match self.run_command(database, doc! { "drop": name }, options).await {
            Ok(_) => Ok(true),
            Err(StoreError::NamespaceNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn drop_database(
        &mut self,
        database: &str,
        options: Option<Document>,
    ) -> Result<bool, StoreError> {
        self.run_command(database, doc! { "dropDatabase": 1 }, options)
            .await?;
        Ok(true)
    }

    async fn rename_collection(
        &mut self,
        database: &str,
        from: &str,
        to: &str,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        let command = doc! {
            "renameCollection": format!("{database}.{from}"),
            "to": format!("{database}.{to}"),
        };
        self.run_command("admin", command, options).await?;
        Ok(doc! { "databaseName": database, "collectionName": to })
    }

    async fn stats(
        &mut self,
        database: &str,
        options: Option<Document>,
    ) -> Result<Document, StoreError> {
        self.run_command(database, doc! { "dbStats": 1 }, options)
            .await
    }

    async fn start_transaction(
        &mut self,
        options: &TransactionOptions,
    ) -> Result<Session, StoreError> {
        if let Some((open, _)) = &self.active {
            return Err(StoreError::Transaction(format!(
                "session {} is still open",
                open.id()
            )));
        }
        let driver_options = transaction_options(options)?;
        let mut driver = self.client()?.start_session(None).await?;
        driver.start_transaction(driver_options).await?;

        self.next_session += 1;
        let session = Session::new(self.next_session);
        self.active = Some((session, driver));
        Ok(session)
    }

    async fn commit_transaction(&mut self, session: Session) -> Result<(), StoreError> {
        match self.active.take() {
            Some((active, mut driver)) if active == session => {
                driver.commit_transaction().await?;
                Ok(())
            }
            other => {
                self.active = other;
                Err(inactive(session))
            }
        }
    }

    async fn abort_transaction(&mut self, session: Session) -> Result<(), StoreError> {
        match self.active.take() {
            Some((active, mut driver)) if active == session => {
                driver.abort_transaction().await?;
                Ok(())
            }
            other => {
                self.active = other;
                Err(inactive(session))
            }
        }
    }
}

fn update_reply(result: mongodb::results::UpdateResult) -> Document {
    let mut reply = acknowledged();
    reply.insert("matchedCount", count(result.matched_count));
    reply.insert("modifiedCount", count(result.modified_count));
    reply.insert("upsertedCount", i32::from(result.upserted_id.is_some()));
    if let Some(id) = result.upserted_id {
        reply.insert("upsertedId", id);
    }
    reply
}
