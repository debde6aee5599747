use super::{SessionRecord, SessionStore, is_valid_session_id};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

const FILE_PREFIX: &str = "session_";
const FILE_SUFFIX: &str = ".json";
const TEMP_SUFFIX: &str = ".tmp";

/// Temp files older than this are leftovers of an interrupted save.
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilesystemOptions {
    /// Directory holding session files; `None` uses [`default_save_path`].
    pub save_path: Option<PathBuf>,
    pub key_pairs: Vec<String>,
    /// Expiry sweep period. The store does not sweep by itself; the
    /// initializer starts [`spawn_expiry_sweep`](crate::store::spawn_expiry_sweep)
    /// with this period when it degrades to this store. Zero disables it.
    pub check_interval: Duration,
}

/// `<system temp dir>/sessions`.
pub fn default_save_path() -> PathBuf {
    std::env::temp_dir().join("sessions")
}

/// Session store writing one JSON file per session into a local directory.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    dir: PathBuf,
    options: FilesystemOptions,
}

impl FilesystemStore {
    pub async fn new(options: FilesystemOptions) -> Result<Self, StoreError> {
        let dir = options.save_path.clone().unwrap_or_else(default_save_path);
        fs::create_dir_all(&dir).await?;
        info!(path = %dir.display(), "filesystem session store ready");
        Ok(Self { dir, options })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn key_pairs(&self) -> &[String] {
        &self.options.key_pairs
    }

    pub fn check_interval(&self) -> Duration {
        self.options.check_interval
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_session_id(id) {
            return Err(StoreError::InvalidSessionId);
        }
        Ok(self.dir.join(format!("{FILE_PREFIX}{id}{FILE_SUFFIX}")))
    }

    async fn read_record(path: &Path) -> Result<Option<SessionRecord>, StoreError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove `session_*.tmp` files last modified before `now - STALE_TEMP_AGE`.
    pub(crate) async fn sweep_temp_files(&self, now: SystemTime) -> Result<u64, StoreError> {
        let Some(cutoff) = now.checked_sub(STALE_TEMP_AGE) else {
            return Ok(0);
        };
        let mut removed = 0u64;
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_temp_file(&path) {
                continue;
            }
            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if modified < cutoff {
                Self::remove(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn remove(path: &Path) -> Result<(), StoreError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn has_name(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with(FILE_PREFIX) && name.ends_with(suffix))
        == Some(true)
}

fn is_session_file(path: &Path) -> bool {
    has_name(path, FILE_SUFFIX)
}

fn is_temp_file(path: &Path) -> bool {
    has_name(path, TEMP_SUFFIX)
}

#[async_trait]
impl SessionStore for FilesystemStore {
    fn backend(&self) -> &'static str {
        "filesystem"
    }

    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let path = self.path_for(id)?;
        Ok(Self::read_record(&path)
            .await?
            .filter(|record| !record.is_expired()))
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let path = self.path_for(&record.id)?;
        let mut record = record.clone();
        if let Some(existing) = Self::read_record(&path).await? {
            record.created = existing.created;
        }
        record.modified = Utc::now();

        // one temp file per write, renamed over the target, so concurrent
        // saves of a session never share or tear a file
        let tmp = self.dir.join(format!(
            "{FILE_PREFIX}{}.{}{TEMP_SUFFIX}",
            record.id,
            uuid::Uuid::new_v4().simple()
        ));
        fs::write(&tmp, serde_json::to_vec(&record)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        Self::remove(&path).await
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut removed = 0u64;
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_session_file(&path) {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(Some(record)) if record.is_expired_at(now) => {
                    Self::remove(&path).await?;
                    removed += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable session file; removing");
                    Self::remove(&path).await?;
                    removed += 1;
                }
            }
        }
        let stale_temp = self.sweep_temp_files(SystemTime::now()).await?;
        debug!(
            removed,
            stale_temp,
            path = %self.dir.display(),
            "filesystem expiry sweep finished"
        );
        Ok(removed)
    }
}
