//! Store configuration loaded from defaults and `SESSION_STORE_*` env vars.

use crate::db::{MysqlStoreOptions, SqlStoreOptions};
use crate::error::StoreError;
use crate::store::filesystem::FilesystemOptions;
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv6Addr;
use std::time::Duration;
use url::Url;

pub const ENV_PREFIX: &str = "SESSION_STORE_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    /// Extra driver parameters appended as the query string.
    pub params: BTreeMap<String, String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            name: "sessions".to_string(),
            params: BTreeMap::new(),
        }
    }
}

impl DbConfig {
    /// Resolve the descriptor into a `mysql://` connection string.
    pub fn connection_string(&self) -> Result<String, StoreError> {
        let mut url = Url::parse(&format!("mysql://{}:{}", self.url_host(), self.port))?;
        // Url only rejects credentials on cannot-be-a-base urls, which mysql:// never is.
        let _ = url.set_username(&self.user);
        if !self.password.is_empty() {
            let _ = url.set_password(Some(&self.password));
        }
        url.set_path(&self.name);
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.params.iter());
        }
        Ok(url.into())
    }

    /// IPv6 literals need brackets inside a URL authority.
    fn url_host(&self) -> String {
        match self.host.parse::<Ipv6Addr>() {
            Ok(addr) => format!("[{addr}]"),
            Err(_) => self.host.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub database: DbConfig,
    pub table_name: String,
    /// Cookie signing/encryption keys handed through to the store.
    pub key_pairs: Vec<String>,
    /// Expiry sweep period in seconds; 0 disables the sweep.
    pub check_interval_secs: u64,
    /// Total connection attempts at startup; `<= 0` selects the default of 5.
    pub max_reconnect: i32,
    /// Custom DDL replacing the bundled MySQL schema. `{table}` is substituted.
    pub ddl: Option<String>,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DbConfig::default(),
            table_name: "sessions".to_string(),
            key_pairs: Vec::new(),
            check_interval_secs: 1800,
            max_reconnect: 0,
            ddl: None,
            max_connections: 10,
            connect_timeout_secs: 5,
        }
    }
}

impl Config {
    /// Defaults overlaid with `SESSION_STORE_*` variables (`__` nests, e.g.
    /// `SESSION_STORE_DATABASE__HOST`). A `.env` file is honoured if present.
    pub fn from_env() -> Result<Self, StoreError> {
        dotenvy::dotenv().ok();
        Self::figment().extract().map_err(StoreError::from)
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn sql_options(&self) -> SqlStoreOptions {
        SqlStoreOptions {
            table_name: self.table_name.clone(),
            key_pairs: self.key_pairs.clone(),
            check_interval: self.check_interval(),
            ddl: self.ddl.clone(),
        }
    }

    pub fn mysql_options(&self) -> Result<MysqlStoreOptions, StoreError> {
        Ok(MysqlStoreOptions {
            url: self.database.connection_string()?,
            max_connections: self.max_connections.max(1),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            store: self.sql_options(),
        })
    }

    /// Fallback store settings: keys and check interval only, default location.
    pub fn fallback_options(&self) -> FilesystemOptions {
        FilesystemOptions {
            save_path: None,
            key_pairs: self.key_pairs.clone(),
            check_interval: self.check_interval(),
        }
    }
}
