//! Write-to-temp-then-rename JSON persistence, shared by the thinking log,
//! task list, and location points (§5).

use agent_core::error::PersistenceError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tokio::sync::Mutex;

/// Serializes a read-modify-write cycle against one file so two concurrent
/// mutations never interleave their writes.
#[derive(Default)]
pub struct PersistLock(Mutex<()>);

impl PersistLock {
    pub fn new() -> Self {
        Self::default()
    }
}

pub async fn write_json_atomic<T: Serialize + Sync>(
    path: &Path,
    value: &T,
    lock: &PersistLock,
) -> Result<(), PersistenceError> {
    let _guard = lock.0.lock().await;
    let data = serde_json::to_vec_pretty(value).map_err(|source| PersistenceError::Serde {
        path: path.display().to_string(),
        source,
    })?;
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, &data)
        .await
        .map_err(|source| PersistenceError::Write {
            path: tmp_path.display().to_string(),
            source,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|source| PersistenceError::Write {
            path: path.display().to_string(),
            source,
        })
}

/// Reads back a persisted file, treating "does not exist yet" as the
/// caller's default rather than an error.
pub async fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, PersistenceError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Serde {
            path: path.display().to_string(),
            source,
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(source) => Err(PersistenceError::Read {
            path: path.display().to_string(),
            source,
        }),
    }
}
