use crate::db::models::{SessionRow, to_unix};
use crate::db::schema::{is_valid_table_name, render_ddl};
use crate::error::StoreError;
use crate::store::{SessionRecord, SessionStore, is_valid_session_id};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::MySqlPool;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct SqlStoreOptions {
    pub table_name: String,
    /// Cookie codec keys; carried for the session layer, not used in SQL.
    pub key_pairs: Vec<String>,
    pub check_interval: Duration,
    /// Table DDL template (`{table}` placeholder). `None` skips table creation.
    pub ddl: Option<String>,
}

impl Default for SqlStoreOptions {
    fn default() -> Self {
        Self {
            table_name: "sessions".to_string(),
            key_pairs: Vec::new(),
            check_interval: Duration::from_secs(1800),
            ddl: None,
        }
    }
}

impl SqlStoreOptions {
    /// Install the driver's DDL unless a custom one was configured.
    pub fn set_ddl(&mut self, template: &str) {
        if self.ddl.is_none() {
            self.ddl = Some(template.to_string());
        }
    }

    /// Rendered DDL split into the statements sent to the server, in order.
    pub fn ddl_statements(&self) -> Vec<String> {
        let Some(template) = self.ddl.as_deref() else {
            return Vec::new();
        };
        render_ddl(template, &self.table_name)
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

struct Queries {
    select: String,
    upsert: String,
    delete: String,
    delete_expired: String,
}

impl Queries {
    fn for_table(table: &str) -> Self {
        Self {
            select: format!(
                "SELECT id, data, created, modified, expires FROM `{table}` WHERE id = ?"
            ),
            upsert: format!(
                "INSERT INTO `{table}` (id, data, created, modified, expires) \
                 VALUES (?, ?, ?, ?, ?) \
                 ON DUPLICATE KEY UPDATE \
                 data = VALUES(data), modified = VALUES(modified), expires = VALUES(expires)"
            ),
            delete: format!("DELETE FROM `{table}` WHERE id = ?"),
            delete_expired: format!("DELETE FROM `{table}` WHERE expires <= ?"),
        }
    }
}

/// Session engine over a MySQL pool. Sharing across tasks relies on the pool.
pub struct SqlStore {
    pool: MySqlPool,
    options: SqlStoreOptions,
    queries: Queries,
}

impl SqlStore {
    /// Validate options and ensure the table exists.
    pub async fn new(pool: MySqlPool, options: SqlStoreOptions) -> Result<Self, StoreError> {
        if !is_valid_table_name(&options.table_name) {
            return Err(StoreError::InvalidTableName(options.table_name));
        }
        let store = Self {
            queries: Queries::for_table(&options.table_name),
            pool,
            options,
        };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub fn options(&self) -> &SqlStoreOptions {
        &self.options
    }

    /// Execute the configured DDL one statement at a time.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        // the driver runs one statement per prepared query
        for stmt in self.options.ddl_statements() {
            sqlx::query(&stmt).execute(&self.pool).await?;
        }
        debug!(table = %self.options.table_name, "session table ensured");
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqlStore {
    fn backend(&self) -> &'static str {
        "sql"
    }

    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        if !is_valid_session_id(id) {
            return Err(StoreError::InvalidSessionId);
        }
        let row: Option<SessionRow> = sqlx::query_as(&self.queries.select)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(SessionRecord::from)
            .filter(|record| !record.is_expired()))
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        if !is_valid_session_id(&record.id) {
            return Err(StoreError::InvalidSessionId);
        }
        let mut row = SessionRow::from(record);
        row.modified = to_unix(Utc::now());
        sqlx::query(&self.queries.upsert)
            .bind(row.id)
            .bind(row.data)
            .bind(row.created)
            .bind(row.modified)
            .bind(row.expires)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        if !is_valid_session_id(id) {
            return Err(StoreError::InvalidSessionId);
        }
        sqlx::query(&self.queries.delete)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(&self.queries.delete_expired)
            .bind(to_unix(Utc::now()))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
