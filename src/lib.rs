pub mod config;
pub mod db;
pub mod error;
pub mod service;
pub mod store;

pub use config::{Config, DbConfig};
pub use db::{MYSQL_DDL, MysqlConnector, MysqlStore};
pub use error::StoreError;
pub use service::{
    Connector, ExponentialBackoff, FixedBackoff, ReconnectBackoff, ResilientInitializer,
    acquire_and_register, acquire_store,
};
pub use store::registry::register;
pub use store::{
    DEFAULT_STORE_NAME, FilesystemStore, SessionRecord, SessionStore, StoreHandle, StoreRegistry,
    spawn_expiry_sweep,
};
