//! Database-backed session storage.
//!
//! Layout:
//! - `schema.rs`: MySQL DDL for the sessions table
//! - `models.rs`: row struct mirroring the table and conversions
//! - `sql_store.rs`: generic SQL session engine over a connection pool
//! - `mysql.rs`: MySQL adapter and connector used by the initializer

pub mod models;
pub mod mysql;
pub mod schema;
pub mod sql_store;

pub use models::SessionRow;
pub use mysql::{MysqlConnector, MysqlStore, MysqlStoreOptions};
pub use schema::{MYSQL_DDL, TABLE_PLACEHOLDER, render_ddl};
pub use sql_store::{SqlStore, SqlStoreOptions};
