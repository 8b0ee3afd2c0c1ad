use crate::clients::{self, CollectionProxy, DatabaseProxy, TransactionBatch, TransactionResult};
use crate::config::{BridgeConfig, ConfigError};
use crate::error::BridgeError;
use crate::router::ShardKey;
use crate::shard_actor::{BridgeRegistry, DocumentShard};
use crate::store::{DocumentStore, MongoStore, StoreError};
use mongodb::options::ClientOptions;
use shard_runtime::LocalRegistry;
use tracing::info;

/// Owns the shard registry and the configuration every request routes with.
///
/// Shards are spawned lazily: the first request routed to `mongo_shard_1` starts that shard,
/// calling the store factory once for it.
///
/// # Example
///
/// ```rust
/// use docbridge::lifecycle::BridgeSystem;
/// use docbridge::model::doc;
/// use docbridge::protocol::Operation;
/// use docbridge::store::MockStore;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), docbridge::error::BridgeError> {
/// let store = MockStore::new();
/// store.expect(Operation::CountDocuments).return_ok(1);
/// let shared = store.clone();
///
/// let system = BridgeSystem::new(Default::default(), move |_name: &str| shared.clone())?;
/// let users = system.collection("users", Some(&7.into()))?;
/// users.insert_one(doc! { "name": "ana" }, None).await?;
/// assert_eq!(users.count_documents(doc! {}, None).await?, 1);
///
/// system.shutdown().await;
/// assert!(store.is_closed());
/// # Ok(())
/// # }
/// ```
pub struct BridgeSystem {
    config: BridgeConfig,
    registry: LocalRegistry<DocumentShard>,
}

impl BridgeSystem {
    /// Starts a system whose shards each get a fresh store from `factory`.
    pub fn new<S, F>(config: BridgeConfig, factory: F) -> Result<Self, ConfigError>
    where
        S: DocumentStore,
        F: Fn(&str) -> S + Send + Sync + 'static,
    {
        config.validate()?;
        info!(
            shards = config.shard_count,
            prefix = %config.shard_prefix,
            "Starting bridge"
        );
        let registry = LocalRegistry::new(config.mailbox_capacity, move |name: &str| {
            DocumentShard::new(factory(name))
        });
        Ok(Self { config, registry })
    }

    /// Every shard backed by its own [`MongoStore`] on `config.mongodb_uri`.
    ///
    /// The URI is parsed once here; each shard opens its client when it starts.
    pub async fn connect(config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let options = ClientOptions::parse(&config.mongodb_uri)
            .await
            .map_err(StoreError::from)?;
        let database = config.default_database.clone();
        let system = Self::new(config, move |_name: &str| {
            MongoStore::new(options.clone(), database.clone())
        })?;
        Ok(system)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &BridgeRegistry {
        &self.registry
    }

    /// Names of the shards started so far.
    pub fn running_shards(&self) -> Vec<String> {
        self.registry.shard_names()
    }

    /// Collection in the shard's default database.
    pub fn collection(
        &self,
        name: &str,
        shard_key: Option<&ShardKey>,
    ) -> Result<CollectionProxy, BridgeError> {
        clients::get_collection(&self.registry, &self.config, None, name, shard_key)
    }

    pub fn database(
        &self,
        name: &str,
        shard_key: Option<&ShardKey>,
    ) -> Result<DatabaseProxy, BridgeError> {
        clients::get_database(&self.registry, &self.config, Some(name), shard_key)
    }

    pub async fn run_transaction(
        &self,
        batch: TransactionBatch,
        shard_key: Option<&ShardKey>,
    ) -> Result<TransactionResult, BridgeError> {
        clients::run_transaction(&self.registry, &self.config, batch, shard_key).await
    }

    /// Stops every shard and waits for it to finish.
    ///
    /// Requests already queued are answered first. Proxies still held afterwards fail with
    /// [`ShardError::ActorClosed`](shard_runtime::ShardError::ActorClosed).
    pub async fn shutdown(self) {
        info!("Shutting down bridge...");
        self.registry.shutdown().await;
        info!("Bridge shut down");
    }
}
