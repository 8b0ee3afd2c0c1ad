//! [`ShardBackend`] implementation that fronts a [`DocumentStore`].

use crate::codec;
use crate::error::BridgeError;
use crate::model::Bson;
use crate::protocol::{Envelope, TransactionOptions};
use crate::shard_actor::executor::{execute_collection_operation, execute_database_operation};
use crate::shard_actor::session::prepare_args_with_session;
use crate::store::{DocumentStore, Namespace, Session};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use shard_runtime::ShardBackend;
use std::fmt;
use tracing::{info, warn};

/// The shard side of the bridge: owns one store connection and runs wire envelopes on it.
pub struct DocumentShard {
    store: Box<dyn DocumentStore>,
}

impl fmt::Debug for DocumentShard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentShard")
            .field("default_database", &self.store.default_database())
            .finish()
    }
}

impl DocumentShard {
    pub fn new(store: impl DocumentStore) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Routes an envelope to the collection executor when it names a collection, else to the
    /// database executor.
    async fn run(&mut self, envelope: &Envelope, args: Vec<Bson>) -> Result<Bson, BridgeError> {
        let database = envelope
            .database_name
            .clone()
            .unwrap_or_else(|| self.store.default_database().to_string());
        match &envelope.collection_name {
            Some(collection) => {
                let ns = Namespace::new(database, collection.as_str());
                execute_collection_operation(self.store.as_mut(), &ns, envelope.operation, args)
                    .await
            }
            None => {
                execute_database_operation(self.store.as_mut(), &database, envelope.operation, args)
                    .await
            }
        }
    }

    async fn run_in_session(
        &mut self,
        envelopes: &[Envelope],
        session: Session,
    ) -> Result<Vec<JsonValue>, BridgeError> {
        let mut replies = Vec::with_capacity(envelopes.len());
        for envelope in envelopes {
            let args =
                prepare_args_with_session(envelope.decoded_arguments(), envelope.operation, session);
            let result = self.run(envelope, args).await?;
            replies.push(codec::encode(&result));
        }
        Ok(replies)
    }
}

#[async_trait]
impl ShardBackend for DocumentShard {
    type Request = JsonValue;
    type Reply = JsonValue;
    type BatchOptions = TransactionOptions;
    type Error = BridgeError;

    async fn on_start(&mut self, shard: &str) -> Result<(), BridgeError> {
        self.store.open(shard).await?;
        info!(
            shard,
            database = self.store.default_database(),
            "Document store ready"
        );
        Ok(())
    }

    async fn execute(&mut self, request: JsonValue) -> Result<JsonValue, BridgeError> {
        let envelope = Envelope::from_wire(request)?;
        let args = envelope.decoded_arguments();
        let result = self.run(&envelope, args).await?;
        Ok(codec::encode(&result))
    }

    /// Runs every envelope inside one store transaction. Any failure aborts it, and the batch
    /// fails as a whole.
    async fn execute_batch(
        &mut self,
        requests: Vec<JsonValue>,
        options: TransactionOptions,
    ) -> Result<Vec<JsonValue>, BridgeError> {
        let envelopes = requests
            .into_iter()
            .map(Envelope::from_wire)
            .collect::<Result<Vec<_>, _>>()?;

        let session = self.store.start_transaction(&options).await?;
        match self.run_in_session(&envelopes, session).await {
            Ok(replies) => {
                self.store.commit_transaction(session).await?;
                info!(session = session.id(), count = replies.len(), "Transaction committed");
                Ok(replies)
            }
            Err(e) => {
                if let Err(abort) = self.store.abort_transaction(session).await {
                    warn!(session = session.id(), error = %abort, "Abort failed");
                }
                warn!(session = session.id(), error = %e, "Transaction rolled back");
                Err(e)
            }
        }
    }

    async fn on_stop(&mut self, shard: &str) {
        self.store.close().await;
        info!(shard, "Document store released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{doc, DateTime, ObjectId};
    use crate::protocol::Operation;
    use crate::store::{MockStore, StoreError, TransactionEvent};
    use serde_json::json;

    #[tokio::test]
    async fn test_execute_round_trips_wire_values() {
        let store = MockStore::new();
        let id = ObjectId::parse_str("507f1f77bcf86cd799439011").unwrap();
        store.expect(Operation::Find).return_ok(vec![doc! {
            "_id": id,
            "name": "ana",
            "at": DateTime::from_millis(1_700_000_000_123),
        }]);
        let mut shard = DocumentShard::new(store.clone());

        let insert = Envelope::collection(
            Some("app"),
            "users",
            Operation::InsertOne,
            &[doc! { "_id": id, "name": "ana" }.into()],
        );
        let reply = shard.execute(insert.to_wire().unwrap()).await.unwrap();
        assert_eq!(reply["insertedId"], json!({"$oid": "507f1f77bcf86cd799439011"}));

        let find = Envelope::collection(Some("app"), "users", Operation::Find, &[]);
        let reply = shard.execute(find.to_wire().unwrap()).await.unwrap();
        assert_eq!(reply[0]["name"], json!("ana"));
        assert_eq!(reply[0]["at"], json!({"$date": "2023-11-14T22:13:20.123Z"}));

        // the store sees native values, not their wire form
        let calls = store.calls();
        assert_eq!(calls[0].target, "app.users");
        assert_eq!(
            calls[0].arguments,
            vec![Bson::Document(doc! { "_id": id, "name": "ana" })]
        );
        store.verify();
    }

    #[tokio::test]
    async fn test_default_database_fills_missing_name() {
        let store = MockStore::with_default_database("main");
        let mut shard = DocumentShard::new(store.clone());
        let stats = Envelope::database(None, Operation::Stats, &[]);
        shard.execute(stats.to_wire().unwrap()).await.unwrap();
        assert_eq!(store.calls()[0].target, "main");
    }

    #[tokio::test]
    async fn test_unknown_operation_is_rejected() {
        let mut shard = DocumentShard::new(MockStore::new());
        let err = shard
            .execute(json!({"collectionName": "users", "operation": "mapReduce", "arguments": []}))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedOperation { .. }));
    }

    #[tokio::test]
    async fn test_store_is_opened_and_closed_with_the_shard() {
        let store = MockStore::new();
        let mut shard = DocumentShard::new(store.clone());
        shard.on_start("mongo_shard_3").await.unwrap();
        assert_eq!(store.opened_by().as_deref(), Some("mongo_shard_3"));
        assert!(!store.is_closed());
        shard.on_stop("mongo_shard_3").await;
        assert!(store.is_closed());
    }

    #[tokio::test]
    async fn test_batch_carries_the_session_on_every_call() {
        let store = MockStore::new();
        let mut shard = DocumentShard::new(store.clone());
        let batch = vec![
            Envelope::collection(None, "users", Operation::InsertOne, &[doc! { "_id": 1 }.into()])
                .to_wire()
                .unwrap(),
            Envelope::collection(
                None,
                "users",
                Operation::UpdateOne,
                &[doc! { "_id": 1 }.into(), doc! { "$set": { "x": 1 } }.into()],
            )
            .to_wire()
            .unwrap(),
            Envelope::database(None, Operation::CreateCollection, &["audit".into()])
                .to_wire()
                .unwrap(),
        ];
        let replies = shard
            .execute_batch(batch, TransactionOptions::default())
            .await
            .unwrap();
        assert_eq!(replies.len(), 3);

        let calls = store.calls();
        assert_eq!(calls.len(), 3);
        let first = calls[0].session.expect("session missing");
        assert!(calls.iter().all(|call| call.session == Some(first)));
        assert_eq!(calls[2].arguments, vec![Bson::from("audit")]);
        assert_eq!(
            store.transactions(),
            vec![
                TransactionEvent::Started(first, TransactionOptions::default()),
                TransactionEvent::Committed(first),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_batch_aborts_and_stops() {
        let store = MockStore::new();
        store.expect(Operation::InsertOne).return_ok(doc! { "insertedId": 2 });
        store
            .expect(Operation::InsertOne)
            .return_err(StoreError::DuplicateKey("test.users _id 1".into()));
        let mut shard = DocumentShard::new(store.clone());

        let insert = |id: i32| {
            Envelope::collection(None, "users", Operation::InsertOne, &[doc! { "_id": id }.into()])
                .to_wire()
                .unwrap()
        };
        let err = shard
            .execute_batch(vec![insert(2), insert(1), insert(3)], TransactionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Store(StoreError::DuplicateKey(_))));

        // the third insert never ran
        assert_eq!(store.calls().len(), 2);
        let session = store.calls()[0].session.expect("session missing");
        assert_eq!(
            store.transactions().last(),
            Some(&TransactionEvent::Aborted(session))
        );

        // the next batch starts a fresh transaction
        shard
            .execute_batch(vec![insert(4)], TransactionOptions::default())
            .await
            .unwrap();
        assert_eq!(
            store.transactions().last(),
            Some(&TransactionEvent::Committed(Session::new(session.id() + 1)))
        );
        store.verify();
    }
}
