//! Session store capability and its backends.
//!
//! Layout:
//! - `filesystem.rs`: local file storage used when the database is unreachable
//! - `registry.rs`: name -> store mapping owned by the host application
//! - `cleanup.rs`: periodic expiry sweep

pub mod cleanup;
pub mod filesystem;
pub mod registry;

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub use cleanup::spawn_expiry_sweep;
pub use filesystem::{FilesystemOptions, FilesystemStore};
pub use registry::{DEFAULT_STORE_NAME, StoreRegistry};

/// Shared handle to whichever backend satisfied initialization.
pub type StoreHandle = Arc<dyn SessionStore>;

/// One persisted session: an opaque payload plus its timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl SessionRecord {
    /// Fresh record with a generated id, expiring `ttl` from now.
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX);
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            data,
            created: now,
            modified: now,
            expires: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Session ids are at most 64 bytes of `[A-Za-z0-9_-]`.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Create/read/update/delete/expire over keyed session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Short backend name used in diagnostics.
    fn backend(&self) -> &'static str;

    /// Missing and expired sessions both yield `None`.
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Insert or update. An existing row keeps its `created` timestamp.
    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Remove every expired session, returning how many were dropped.
    async fn delete_expired(&self) -> Result<u64, StoreError>;
}

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}
