//! # docbridge demo
//!
//! Connects a [`BridgeSystem`] to the MongoDB deployment in `DOCBRIDGE_MONGODB_URI` and walks
//! through the caller API. Transactions need a replica set or sharded cluster.
//!
//! 1. Insert and read back through a database proxy.
//! 2. Move a balance between two accounts in one transaction.
//! 3. Attempt a transaction that fails halfway and check nothing was applied.
//!
//! Configuration comes from the `DOCBRIDGE_*` environment variables; logging from `RUST_LOG`.

use docbridge::clients::TransactionBatch;
use docbridge::codec;
use docbridge::config::BridgeConfig;
use docbridge::lifecycle::{setup_tracing, BridgeSystem};
use docbridge::model::doc;
use docbridge::{BridgeError, ShardKey};
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), BridgeError> {
    setup_tracing();

    let config = BridgeConfig::from_env()?;
    info!(shards = config.shard_count, "Starting docbridge demo");
    let system = BridgeSystem::connect(config).await?;

    let span = tracing::info_span!("insert_and_find");
    async {
        let db = system.database("dotest2", None)?;
        let collection = db.collection("testCollection");
        let inserted = collection
            .insert_one(doc! { "name": "test", "value": 42 }, None)
            .await?;
        let docs = collection.find(doc! {}, None).to_vec().await?;
        info!(
            inserted_id = %codec::encode(&inserted.inserted_id),
            docs = %codec::encode(&docs.into()),
            shard = collection.shard(),
            "Inserted and read back"
        );
        Ok::<_, BridgeError>(())
    }
    .instrument(span)
    .await?;

    // Transactions land on the shard chosen by the key, so seed that same shard.
    let bank = ShardKey::from("bank");
    let bank_db = system.database("bank", Some(&bank))?;
    bank_db.drop_database().await?;
    let accounts = bank_db.collection("accounts");
    accounts
        .insert_many(
            vec![
                doc! { "_id": "alice", "balance": 100 },
                doc! { "_id": "bob", "balance": 20 },
            ],
            None,
        )
        .await?;

    let transfer = TransactionBatch::new()
        .in_database("bank")
        .update_one(
            "accounts",
            doc! { "_id": "alice" },
            doc! { "$inc": { "balance": -30 } },
        )
        .update_one(
            "accounts",
            doc! { "_id": "bob" },
            doc! { "$inc": { "balance": 30 } },
        );
    let committed = system.run_transaction(transfer, Some(&bank)).await?;
    info!(operations = committed.len(), "Transfer committed");

    let broken = TransactionBatch::new()
        .in_database("bank")
        .update_one(
            "accounts",
            doc! { "_id": "alice" },
            doc! { "$inc": { "balance": -1000 } },
        )
        .insert_one("accounts", doc! { "_id": "bob" });
    match system.run_transaction(broken, Some(&bank)).await {
        Ok(_) => error!("Duplicate insert unexpectedly committed"),
        Err(e) => info!(error = %e, "Transaction rolled back as expected"),
    }

    let balances = accounts
        .find(doc! {}, None)
        .sort(doc! { "_id": 1 })
        .to_vec()
        .await?;
    for account in &balances {
        info!(account = %account, "Final balance");
    }

    system.shutdown().await;
    info!("Demo completed successfully");
    Ok(())
}
