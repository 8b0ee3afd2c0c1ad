use docbridge::clients::{get_collection, get_database, run_transaction, TransactionBatch};
use docbridge::config::{BridgeConfig, ConfigError};
use docbridge::model::doc;
use docbridge::protocol::{dispatch, Envelope, Operation, TransactionOptions};
use docbridge::shard_actor::DocumentShard;
use docbridge::store::StoreError;
use docbridge::{BridgeError, ShardKey};
use serde_json::json;
use shard_runtime::mock::{create_mock_handle, expect_execute, MockRegistry, MockShard};
use shard_runtime::ShardError;

/// Proxies routed through a recording registry, answered by one scripted shard.
///
/// Pattern: Facade + MockRegistry
/// - Real routing and envelope building
/// - Scripted shard replies (no store involved)
#[tokio::test]
async fn test_keys_route_to_stable_instance_names() {
    let mock = MockShard::<DocumentShard>::new("mock");
    let registry = MockRegistry::new(&mock);
    let config = BridgeConfig::default().with_shard_count(3);

    for _ in 0..3 {
        get_collection(&registry, &config, None, "users", Some(&ShardKey::from("user-42")))
            .expect("Failed to route");
    }
    get_database(&registry, &config, Some("app"), Some(&ShardKey::Number(5)))
        .expect("Failed to route");

    assert_eq!(
        registry.resolved_names(),
        vec![
            "mongo_shard_1",
            "mongo_shard_1",
            "mongo_shard_1",
            "mongo_shard_2",
        ]
    );
    // Routing alone never reaches the shard
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_keyless_routing_stays_in_range() {
    let mock = MockShard::<DocumentShard>::new("mock");
    let registry = MockRegistry::new(&mock);
    let config = BridgeConfig::default().with_shard_prefix("do_");

    for _ in 0..50 {
        get_collection(&registry, &config, None, "users", None).expect("Failed to route");
    }
    let names = registry.resolved_names();
    assert!(names.iter().all(|n| n == "do_0" || n == "do_1"), "{names:?}");
}

#[tokio::test]
async fn test_unbound_registry_is_a_config_error() {
    let registry = MockRegistry::<DocumentShard>::unbound();
    let err = get_collection(&registry, &BridgeConfig::default(), None, "users", None).unwrap_err();
    assert!(matches!(err, BridgeError::Config(ConfigError::Unbound(_))));

    let bad = BridgeConfig::default().with_shard_count(0);
    let err = get_database(&registry, &bad, None, None).unwrap_err();
    assert!(matches!(err, BridgeError::Config(ConfigError::InvalidNumber { .. })));
    // An invalid config fails before the registry is asked
    assert_eq!(registry.resolved_names().len(), 1);
}

/// Errors raised on the shard come back as the same variant.
#[tokio::test]
async fn test_shard_errors_propagate_unchanged() {
    let mock = MockShard::<DocumentShard>::new("mongo_shard_0");
    let registry = MockRegistry::new(&mock);
    mock.expect_execute()
        .return_err(ShardError::Backend(Box::new(BridgeError::Store(
            StoreError::DuplicateKey("test.users _id 1".into()),
        ))));
    mock.expect_execute()
        .return_err(ShardError::ActorClosed);

    let users = get_collection(&registry, &BridgeConfig::default(), None, "users", None)
        .expect("Failed to route");
    let err = users
        .insert_one(doc! { "_id": 1 }, None)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Store(StoreError::DuplicateKey(_))));

    let err = users.count_documents(doc! {}, None).await.unwrap_err();
    assert!(matches!(err, BridgeError::Transport(ShardError::ActorClosed)));
    mock.verify();
}

#[tokio::test]
async fn test_transaction_sends_one_batch() {
    let mock = MockShard::<DocumentShard>::new("mongo_shard_0");
    let registry = MockRegistry::new(&mock);
    mock.expect_batch().return_ok(vec![
        json!({"acknowledged": true, "insertedId": 1}),
        json!({"acknowledged": true, "deletedCount": 3}),
    ]);

    let options = TransactionOptions {
        write_concern: Some("majority".into()),
        ..Default::default()
    };
    let batch = TransactionBatch::new()
        .with_options(options.clone())
        .insert_one("users", doc! { "_id": 1 })
        .delete_many("sessions", doc! { "user": 1 });

    let result = run_transaction(&registry, &BridgeConfig::default(), batch, Some(&ShardKey::Number(0)))
        .await
        .expect("Transaction failed");
    assert_eq!(result.len(), 2);
    let deleted: docbridge::clients::DeleteResult = result.get(1).expect("bad reply");
    assert_eq!(deleted.deleted_count, 3);

    let batches = mock.batches();
    assert_eq!(batches.len(), 1);
    let (envelopes, sent_options) = &batches[0];
    assert_eq!(sent_options, &options);
    assert_eq!(
        envelopes,
        &vec![
            json!({"collectionName": "users", "operation": "insertOne", "arguments": [{"_id": 1}]}),
            json!({
                "collectionName": "sessions",
                "operation": "deleteMany",
                "arguments": [{"user": 1}, {}],
            }),
        ]
    );
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_failed_transaction_reports_whole_batch() {
    let mock = MockShard::<DocumentShard>::new("mongo_shard_0");
    let registry = MockRegistry::new(&mock);
    mock.expect_batch()
        .return_err(ShardError::Backend(Box::new(BridgeError::Store(
            StoreError::Transaction("write conflict".into()),
        ))));

    let batch = TransactionBatch::new().insert_one("users", doc! {});
    let err = run_transaction(&registry, &BridgeConfig::default(), batch, None)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Store(StoreError::Transaction(_))));
}

#[tokio::test]
async fn test_short_batch_reply_is_a_protocol_error() {
    let mock = MockShard::<DocumentShard>::new("mongo_shard_0");
    let registry = MockRegistry::new(&mock);
    mock.expect_batch().return_ok(vec![json!(null)]);

    let batch = TransactionBatch::new()
        .insert_one("users", doc! {})
        .insert_one("users", doc! {});
    let err = run_transaction(&registry, &BridgeConfig::default(), batch, None)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Protocol(_)));
}

/// Step-by-step: the test owns the mailbox and answers by hand.
#[tokio::test]
async fn test_dispatch_waits_for_the_reply() {
    let (handle, mut receiver) = create_mock_handle::<DocumentShard>("mongo_shard_0", 4);

    let envelope = Envelope::collection(
        Some("app"),
        "users",
        Operation::Distinct,
        &["name".into()],
    );
    let call = tokio::spawn(async move { dispatch(&handle, envelope).await });

    let (request, respond_to) = expect_execute(&mut receiver)
        .await
        .expect("Expected an execute request");
    assert_eq!(request["operation"], json!("distinct"));
    assert_eq!(request["arguments"], json!(["name"]));
    respond_to
        .send(Ok(json!(["ana", {"$date": "2024-01-01T00:00:00.000Z"}])))
        .expect("caller went away");

    let reply = call.await.expect("task panicked").expect("dispatch failed");
    let values = reply.as_array().expect("array reply");
    assert_eq!(values.len(), 2);
    assert!(matches!(values[1], docbridge::model::Bson::DateTime(_)));
}
