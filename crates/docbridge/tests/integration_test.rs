use docbridge::clients::TransactionBatch;
use docbridge::config::BridgeConfig;
use docbridge::lifecycle::BridgeSystem;
use docbridge::model::{binary, doc, Bson, DateTime, ObjectId};
use docbridge::protocol::{Operation, TransactionOptions};
use docbridge::store::{MockStore, StoreError, TransactionEvent};
use docbridge::{BridgeError, ShardKey};
use shard_runtime::ShardError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Every shard shares `store`, so the test sees every call in one place.
fn system(store: &MockStore) -> BridgeSystem {
    let shared = store.clone();
    BridgeSystem::new(BridgeConfig::default(), move |_name: &str| shared.clone())
        .expect("default config is valid")
}

fn key(n: i64) -> ShardKey {
    ShardKey::Number(n)
}

/// Full round trip through real shards: every collection operation reaches the store with its
/// positional arguments decoded, and every reply comes back typed.
#[tokio::test]
async fn test_collection_operations_end_to_end() {
    let store = MockStore::new();
    let system = system(&store);
    let users = system
        .database("app", Some(&key(1)))
        .expect("Failed to route")
        .collection("users");

    store
        .expect(Operation::FindOne)
        .return_ok(doc! { "_id": 1, "name": "ana" });
    store
        .expect(Operation::Find)
        .return_ok(vec![doc! { "name": "cy" }, doc! { "name": "ana" }]);
    store.expect(Operation::UpdateOne).return_ok(doc! {
        "acknowledged": true,
        "matchedCount": 0,
        "modifiedCount": 0,
        "upsertedCount": 1,
        "upsertedId": ObjectId::new(),
    });
    store
        .expect(Operation::FindOneAndUpdate)
        .return_ok(doc! { "name": "bo", "team": "red" });
    store
        .expect(Operation::CountDocuments)
        .return_ok(4i64);
    store
        .expect(Operation::Distinct)
        .return_ok(vec!["ana", "bo", "cy", "dee"]);
    store
        .expect(Operation::Aggregate)
        .return_ok(vec![doc! { "adults": 3 }]);
    store
        .expect(Operation::DeleteMany)
        .return_ok(doc! { "acknowledged": true, "deletedCount": 2 });

    let inserted = users
        .insert_one(doc! { "name": "ana", "age": 31 }, None)
        .await
        .expect("Failed to insert");
    assert!(inserted.acknowledged);
    assert!(inserted.inserted_id.as_object_id().is_some());

    let many = users
        .insert_many(vec![doc! { "_id": "bo" }, doc! { "_id": "cy" }], None)
        .await
        .expect("Failed to insert many");
    assert_eq!(many.inserted_count, 2);
    assert_eq!(many.inserted_ids[&1], Bson::from("cy"));

    let ana = users
        .find_one(doc! { "_id": 1 }, None)
        .await
        .expect("Failed to find")
        .expect("ana not found");
    assert_eq!(ana.get_str("name").unwrap(), "ana");

    let older = users
        .find(doc! { "age": { "$gte": 30 } }, None)
        .sort(doc! { "age": -1 })
        .project(doc! { "name": 1, "_id": 0 })
        .to_vec()
        .await
        .expect("Failed to run cursor");
    assert_eq!(older, vec![doc! { "name": "cy" }, doc! { "name": "ana" }]);

    let upserted = users
        .update_one(
            doc! { "name": "dee" },
            doc! { "$set": { "age": 19 } },
            Some(doc! { "upsert": true }),
        )
        .await
        .expect("Failed to upsert");
    assert_eq!(upserted.upserted_count, 1);
    assert!(upserted.upserted_id.is_some());

    let after = users
        .find_one_and_update(
            doc! { "name": "bo" },
            doc! { "$set": { "team": "red" } },
            Some(doc! { "returnDocument": "after" }),
        )
        .await
        .expect("Failed to findOneAndUpdate")
        .expect("bo not found");
    assert_eq!(after.get_str("team").unwrap(), "red");

    assert_eq!(users.count_documents(doc! {}, None).await.expect("Failed to count"), 4);
    assert_eq!(
        users.distinct("name", None, None).await.expect("Failed to run distinct").len(),
        4
    );

    let adults = users
        .aggregate(vec![doc! { "$match": { "age": { "$gt": 20 } } }, doc! { "$count": "adults" }], None)
        .to_vec()
        .await
        .expect("Failed to aggregate");
    assert_eq!(adults, vec![doc! { "adults": 3 }]);

    // Unscripted: the store answers with an empty result of the right shape
    let missing = users
        .find_one_and_delete(doc! { "name": "zed" }, None)
        .await
        .expect("Failed to findOneAndDelete");
    assert_eq!(missing, None);
    let one = users.delete_one(doc! { "name": "zed" }, None).await.expect("Failed to delete one");
    assert_eq!(one.deleted_count, 0);

    let rest = users.delete_many(doc! {}, None).await.expect("Failed to delete many");
    assert_eq!(rest.deleted_count, 2);

    store.verify();
    let calls = store.calls();
    assert!(calls.iter().all(|call| call.target == "app.users"));
    assert!(calls.iter().all(|call| call.session.is_none()));

    let cursor_call = &calls[3];
    assert_eq!(cursor_call.operation, Operation::Find);
    assert_eq!(cursor_call.arguments, vec![Bson::Document(doc! { "age": { "$gte": 30 } })]);
    assert_eq!(
        cursor_call.options,
        Some(doc! { "sort": { "age": -1 }, "projection": { "name": 1, "_id": 0 } })
    );

    let update_call = &calls[4];
    assert_eq!(
        update_call.arguments,
        vec![
            Bson::Document(doc! { "name": "dee" }),
            Bson::Document(doc! { "$set": { "age": 19 } }),
        ]
    );
    assert_eq!(update_call.options, Some(doc! { "upsert": true }));
}

/// Dates, ids and binary values reach the store as native values and come back typed.
#[tokio::test]
async fn test_extended_types_survive_the_boundary() {
    let store = MockStore::new();
    let system = system(&store);
    let events = system
        .collection("events", Some(&"tenant-a".into()))
        .expect("Failed to route");

    let id = ObjectId::parse_str("507f1f77bcf86cd799439011").expect("valid hex");
    let at = DateTime::from_millis(1_700_000_000_123);
    let event = doc! {
        "_id": id,
        "at": at,
        "payload": binary(vec![0, 1, 254, 255]),
        "tags": ["a", "b"],
    };
    store.expect(Operation::FindOne).return_ok(event.clone());

    events.insert_one(event.clone(), None).await.expect("Failed to insert");
    let found = events
        .find_one(doc! { "at": at }, None)
        .await
        .expect("Failed to find")
        .expect("event not found");
    assert_eq!(found, event);

    let calls = store.calls();
    assert_eq!(calls[0].arguments, vec![Bson::Document(event)]);
    assert_eq!(calls[1].arguments, vec![Bson::Document(doc! { "at": at })]);
    assert_eq!(calls[0].target, "test.events");
}

#[tokio::test]
async fn test_database_management() {
    let store = MockStore::new();
    let system = system(&store);
    let db = system
        .database("inventory", Some(&key(0)))
        .expect("Failed to route");

    store
        .expect(Operation::CreateCollection)
        .return_ok(doc! { "databaseName": "inventory", "collectionName": "items" });
    store
        .expect(Operation::CreateCollection)
        .return_err(StoreError::NamespaceExists("inventory.items".into()));
    store
        .expect(Operation::ListCollections)
        .return_ok(vec![doc! { "name": "products", "type": "collection" }]);
    store
        .expect(Operation::Stats)
        .return_ok(doc! { "db": "inventory", "objects": 1 });
    store.expect(Operation::DropCollection).return_ok(true);
    store.expect(Operation::DropCollection).return_ok(false);

    let created = db
        .create_collection("items", None)
        .await
        .expect("Failed to create collection");
    assert_eq!(created.get_str("collectionName").unwrap(), "items");

    let err = db.create_collection("items", None).await.unwrap_err();
    assert!(matches!(err, BridgeError::Store(StoreError::NamespaceExists(_))));

    let renamed = db
        .rename_collection("items", "products", None)
        .await
        .expect("Failed to rename");
    assert_eq!(renamed.get_str("collectionName").unwrap(), "products");

    let listed = db.list_collections(None, None).await.expect("Failed to list");
    assert_eq!(listed, vec![doc! { "name": "products", "type": "collection" }]);

    let stats = db.stats(None).await.expect("Failed to get stats");
    assert_eq!(stats.get("objects"), Some(&Bson::Int32(1)));

    assert!(db.drop_collection("products").await.expect("Failed to drop"));
    assert!(!db.drop_collection("products").await.expect("Failed to drop"));
    assert!(db.drop_database().await.expect("Failed to drop database"));

    store.verify();
    assert!(store.calls().iter().all(|call| call.target == "inventory"));
    assert_eq!(
        store.calls()[2].arguments,
        vec![Bson::from("items"), Bson::from("products")]
    );
}

#[tokio::test]
async fn test_operation_sent_to_wrong_scope_is_unsupported() {
    let store = MockStore::new();
    let system = system(&store);

    // A database operation smuggled into a collection transaction
    let batch = TransactionBatch::new().push("users", Operation::DropDatabase, vec![]);
    let err = system
        .run_transaction(batch, Some(&key(0)))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::UnsupportedOperation { .. }));
    assert!(store.calls().is_empty());
    match store.transactions().as_slice() {
        [TransactionEvent::Started(session, _), TransactionEvent::Aborted(aborted)] => {
            assert_eq!(session, aborted)
        }
        other => panic!("unexpected transaction events {other:?}"),
    }

    // The shard keeps serving afterwards, outside any transaction
    let db = system.database("app", Some(&key(0))).expect("Failed to route");
    assert!(db.list_collections(None, None).await.is_ok());
    assert_eq!(store.calls()[0].session, None);
}

#[tokio::test]
async fn test_transaction_commits_all_operations() {
    let store = MockStore::new();
    let system = system(&store);
    let bank = key(5);

    let options = TransactionOptions {
        read_concern: Some("snapshot".into()),
        write_concern: Some("majority".into()),
        max_commit_time_ms: Some(500),
    };
    let batch = TransactionBatch::new()
        .in_database("bank")
        .with_options(options.clone())
        .update_one("accounts", doc! { "_id": "alice" }, doc! { "$inc": { "balance": -40 } })
        .update_one("accounts", doc! { "_id": "bob" }, doc! { "$inc": { "balance": 40 } })
        .insert_one("ledger", doc! { "amount": 40 })
        .delete_many("holds", doc! { "account": "alice" });
    let result = system
        .run_transaction(batch, Some(&bank))
        .await
        .expect("Transaction should commit");
    assert_eq!(result.len(), 4);

    let calls = store.calls();
    assert_eq!(
        calls.iter().map(|c| c.operation).collect::<Vec<_>>(),
        vec![
            Operation::UpdateOne,
            Operation::UpdateOne,
            Operation::InsertOne,
            Operation::DeleteMany,
        ]
    );
    let session = calls[0].session.expect("first call has no session");
    assert!(calls.iter().all(|c| c.session == Some(session)));
    // deleteMany's filter is left alone; the session lands in its options
    assert_eq!(calls[3].arguments, vec![Bson::Document(doc! { "account": "alice" })]);
    assert_eq!(calls[3].target, "bank.holds");

    assert_eq!(
        store.transactions(),
        vec![
            TransactionEvent::Started(session, options),
            TransactionEvent::Committed(session),
        ]
    );
}

#[tokio::test]
async fn test_failed_transaction_aborts_and_stops() {
    let store = MockStore::new();
    let system = system(&store);
    let bank = key(5);

    store
        .expect(Operation::InsertOne)
        .return_err(StoreError::DuplicateKey("bank.accounts _id alice".into()));

    let batch = TransactionBatch::new()
        .in_database("bank")
        .update_one("accounts", doc! { "_id": "alice" }, doc! { "$set": { "balance": 0 } })
        .insert_one("accounts", doc! { "_id": "alice" })
        .delete_one("accounts", doc! { "_id": "bob" });
    let err = system
        .run_transaction(batch, Some(&bank))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Store(StoreError::DuplicateKey(_))));

    // The deleteOne after the failure never ran
    assert_eq!(
        store.operations(),
        vec![Operation::UpdateOne, Operation::InsertOne]
    );
    let failed = store.calls()[0].session.expect("session missing");
    assert_eq!(
        store.transactions().last(),
        Some(&TransactionEvent::Aborted(failed))
    );

    // A later transaction on the same shard starts cleanly
    let retry = TransactionBatch::new()
        .in_database("bank")
        .update_one("accounts", doc! { "_id": "alice" }, doc! { "$set": { "balance": 0 } });
    system
        .run_transaction(retry, Some(&bank))
        .await
        .expect("Retry should commit");
    match store.transactions().as_slice() {
        [.., TransactionEvent::Started(next, _), TransactionEvent::Committed(committed)] => {
            assert_eq!(next, committed);
            assert_ne!(*next, failed);
        }
        other => panic!("unexpected transaction events {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_transaction_touches_no_shard() {
    let store = MockStore::new();
    let system = system(&store);
    let result = system
        .run_transaction(TransactionBatch::new(), None)
        .await
        .expect("Empty batch should succeed");
    assert!(result.is_empty());
    assert!(system.running_shards().is_empty());
    assert!(store.transactions().is_empty());
}

/// Keys pin requests to one shard; each shard owns its own store.
#[tokio::test]
async fn test_shards_are_isolated() {
    let stores: Arc<Mutex<HashMap<String, MockStore>>> = Arc::default();
    let registered = stores.clone();
    let system = BridgeSystem::new(BridgeConfig::default(), move |name: &str| {
        let store = MockStore::new();
        registered
            .lock()
            .expect("store map poisoned")
            .insert(name.to_string(), store.clone());
        store
    })
    .expect("default config is valid");

    let on_zero = system.collection("notes", Some(&key(0))).expect("Failed to route");
    let on_one = system.collection("notes", Some(&key(1))).expect("Failed to route");
    assert_eq!(on_zero.shard(), "mongo_shard_0");
    assert_eq!(on_one.shard(), "mongo_shard_1");

    on_zero
        .insert_one(doc! { "text": "hi" }, None)
        .await
        .expect("Failed to insert");
    on_one.count_documents(doc! {}, None).await.expect("Failed to count");

    let stores = stores.lock().expect("store map poisoned").clone();
    assert_eq!(stores["mongo_shard_0"].operations(), vec![Operation::InsertOne]);
    assert_eq!(stores["mongo_shard_1"].operations(), vec![Operation::CountDocuments]);
    assert_eq!(
        system.running_shards(),
        vec!["mongo_shard_0".to_string(), "mongo_shard_1".to_string()]
    );
}

/// Shutdown completes while a proxy is still held; the proxy then fails cleanly.
#[tokio::test]
async fn test_shutdown_with_held_proxy() {
    let store = MockStore::new();
    let system = system(&store);
    let users = system.collection("users", Some(&key(3))).expect("Failed to route");
    users
        .insert_one(doc! { "name": "ana" }, None)
        .await
        .expect("Failed to insert");
    assert_eq!(store.opened_by().as_deref(), Some("mongo_shard_1"));

    tokio::time::timeout(std::time::Duration::from_secs(5), system.shutdown())
        .await
        .expect("Shutdown should not wait for the held proxy");
    assert!(store.is_closed());

    let err = users.count_documents(doc! {}, None).await.unwrap_err();
    assert!(matches!(err, BridgeError::Transport(ShardError::ActorClosed)));
    assert_eq!(store.operations(), vec![Operation::InsertOne]);
}
