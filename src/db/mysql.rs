use crate::db::schema::MYSQL_DDL;
use crate::db::sql_store::{SqlStore, SqlStoreOptions};
use crate::error::StoreError;
use crate::service::initializer::Connector;
use crate::store::{SessionRecord, SessionStore, StoreHandle};
use async_trait::async_trait;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct MysqlStoreOptions {
    /// `mysql://` connection string.
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub store: SqlStoreOptions,
}

/// MySQL session store: the generic SQL engine with the MySQL schema.
pub struct MysqlStore {
    inner: SqlStore,
}

impl MysqlStore {
    /// Open a pool and build the store. Fails if the server is unreachable
    /// or the table cannot be created.
    pub async fn connect(options: &MysqlStoreOptions) -> Result<Self, StoreError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.connect_timeout)
            .connect(&options.url)
            .await?;
        Self::from_pool(pool, options.store.clone()).await
    }

    pub async fn from_pool(pool: MySqlPool, options: SqlStoreOptions) -> Result<Self, StoreError> {
        let inner = SqlStore::new(pool, Self::schema_options(options)).await?;
        info!(table = %inner.options().table_name, "mysql session store ready");
        Ok(Self { inner })
    }

    /// `options` with the MySQL DDL installed unless a custom one is set.
    pub fn schema_options(mut options: SqlStoreOptions) -> SqlStoreOptions {
        options.set_ddl(MYSQL_DDL);
        options
    }

    pub fn inner(&self) -> &SqlStore {
        &self.inner
    }

    pub fn key_pairs(&self) -> &[String] {
        &self.inner.options().key_pairs
    }

    /// Configured sweep period. Not acted on by the store; hosts pass it to
    /// [`spawn_expiry_sweep`](crate::store::spawn_expiry_sweep).
    pub fn check_interval(&self) -> Duration {
        self.inner.options().check_interval
    }
}

#[async_trait]
impl SessionStore for MysqlStore {
    fn backend(&self) -> &'static str {
        "mysql"
    }

    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        self.inner.load(id).await
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.inner.save(record).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        self.inner.delete_expired().await
    }
}

/// Opens a fresh [`MysqlStore`] on every attempt.
#[derive(Debug, Clone)]
pub struct MysqlConnector {
    options: MysqlStoreOptions,
}

impl MysqlConnector {
    pub fn new(options: MysqlStoreOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MysqlStoreOptions {
        &self.options
    }
}

#[async_trait]
impl Connector for MysqlConnector {
    async fn connect(&self) -> Result<StoreHandle, StoreError> {
        let store = MysqlStore::connect(&self.options).await?;
        Ok(Arc::new(store))
    }
}
