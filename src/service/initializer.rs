use crate::config::Config;
use crate::db::MysqlConnector;
use crate::error::StoreError;
use crate::service::backoff::{FixedBackoff, ReconnectBackoff};
use crate::store::registry::{StoreRegistry, register};
use crate::store::{FilesystemOptions, FilesystemStore, StoreHandle, spawn_expiry_sweep};
use async_trait::async_trait;
use backon::Retryable;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

/// Attempts made when `max_reconnect` is zero or negative.
pub const DEFAULT_MAX_RECONNECT: usize = 5;

/// Builds the primary, database-backed store. Called once per attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<StoreHandle, StoreError>;
}

/// Total attempts for a configured bound; never less than one.
pub fn attempt_bound(max_reconnect: i32) -> usize {
    usize::try_from(max_reconnect)
        .ok()
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAX_RECONNECT)
}

/// Acquires a session store without failing startup on a database outage.
///
/// The connector is tried up to the attempt bound, with the backoff policy
/// sleeping between attempts. If every attempt fails the filesystem store is
/// built instead, so sessions keep working but are no longer shared between
/// instances or durable across the database.
pub struct ResilientInitializer<C, B = FixedBackoff> {
    connector: C,
    backoff: B,
    attempts: usize,
    fallback: FilesystemOptions,
}

impl<C: Connector> ResilientInitializer<C, FixedBackoff> {
    pub fn new(connector: C, max_reconnect: i32, fallback: FilesystemOptions) -> Self {
        Self {
            connector,
            backoff: FixedBackoff::default(),
            attempts: attempt_bound(max_reconnect),
            fallback,
        }
    }
}

impl<C: Connector, B: ReconnectBackoff> ResilientInitializer<C, B> {
    pub fn with_backoff<B2: ReconnectBackoff>(self, backoff: B2) -> ResilientInitializer<C, B2> {
        ResilientInitializer {
            connector: self.connector,
            backoff,
            attempts: self.attempts,
            fallback: self.fallback,
        }
    }

    pub fn with_fallback_options(mut self, fallback: FilesystemOptions) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Returns the database-backed store, or the filesystem store once every
    /// attempt has failed. Errors only if the fallback cannot be built either.
    pub async fn acquire(&self) -> Result<StoreHandle, StoreError> {
        let bound = self.attempts;
        let retried = AtomicUsize::new(0);

        let primary = (|| async { self.connector.connect().await })
            .retry(self.backoff.builder(bound - 1))
            .notify(|err: &StoreError, dur: Duration| {
                let attempt = retried.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(error = %err, "session database connect failed");
                warn!(
                    "({}/{}) reconnecting session database after {:?}",
                    attempt, bound, dur
                );
            })
            .await;

        let primary_err = match primary {
            Ok(store) => {
                if retried.load(Ordering::SeqCst) > 0 {
                    info!(backend = store.backend(), "session database reconnected successfully");
                }
                return Ok(store);
            }
            Err(e) => e,
        };

        error!(
            error = %primary_err,
            attempts = bound,
            "session database unavailable after all attempts"
        );
        degrade(&self.fallback, primary_err).await
    }
}

/// Build the filesystem store in place of a primary backend that failed with
/// `primary_err`, and start its expiry sweep at `fallback.check_interval`.
///
/// Must be called inside a tokio runtime when the interval is non-zero.
pub async fn degrade(
    fallback: &FilesystemOptions,
    primary_err: StoreError,
) -> Result<StoreHandle, StoreError> {
    match FilesystemStore::new(fallback.clone()).await {
        Ok(store) => {
            warn!(
                path = %store.dir().display(),
                "falling back to filesystem session store; sessions are local to this instance"
            );
            let store: StoreHandle = Arc::new(store);
            // detached; lives as long as the runtime
            let _ = spawn_expiry_sweep(store.clone(), fallback.check_interval);
            Ok(store)
        }
        Err(fallback_err) => {
            error!(error = %fallback_err, "fallback session store failed");
            Err(StoreError::Unavailable {
                primary: Box::new(primary_err),
                fallback: Box::new(fallback_err),
            })
        }
    }
}

/// Acquire the MySQL session store described by `config`, degrading to the
/// filesystem store (keys and check interval only, default location).
pub async fn acquire_store(config: &Config) -> Result<StoreHandle, StoreError> {
    let options = match config.mysql_options() {
        Ok(options) => options,
        Err(e) => {
            error!(error = %e, "invalid session database settings");
            return degrade(&config.fallback_options(), e).await;
        }
    };
    let connector = MysqlConnector::new(options);
    ResilientInitializer::new(connector, config.max_reconnect, config.fallback_options())
        .acquire()
        .await
}

/// [`acquire_store`] followed by registration under `name` (default `"mysql"`).
pub async fn acquire_and_register(
    config: &Config,
    registry: &mut StoreRegistry,
    name: Option<&str>,
) -> Result<StoreHandle, StoreError> {
    let store = acquire_store(config).await?;
    register(registry, store.clone(), name);
    Ok(store)
}
