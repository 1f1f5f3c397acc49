use super::protocol::{KeyConfig, KvError, sanitize};
use crate::codec::{self, Value};
use crate::error::Error;
use crate::identity;

use dashmap::DashMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Node-local persistent store: one file per key at `<root>/<gid>/<key>`,
/// holding the codec form of the value. Gid and key are sanitized before they
/// become path components.
///
/// Writes land in a temp file that is renamed over the key, so a reader sees
/// either the old or the new value and never a partial one. A per-gid lock
/// orders writers against the read-then-unlink of `del`.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
    locks: Arc<DashMap<String, Arc<RwLock<()>>>>,
}

/// Temp files start with a dot, which no sanitized key can.
const TEMP_PREFIX: char = '.';

fn io_error(path: &Path, err: std::io::Error) -> Error {
    KvError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
    .into()
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn group_dir(&self, gid: &str) -> PathBuf {
        self.root.join(sanitize(gid))
    }

    fn lock(&self, gid: &str) -> Arc<RwLock<()>> {
        self.locks.entry(sanitize(gid)).or_default().clone()
    }

    fn file_path(&self, gid: &str, key: &str) -> Result<PathBuf, Error> {
        let name = sanitize(key);
        if name.is_empty() {
            return Err(KvError::InvalidKey(format!("{key:?} has no usable characters")).into());
        }
        Ok(self.group_dir(gid).join(name))
    }

    pub async fn put(&self, value: Value, config: &KeyConfig) -> Result<Value, Error> {
        let key = match &config.key {
            Some(key) => key.clone(),
            None => identity::content_id(&value)?,
        };
        let serialized = codec::serialize(&value)?;
        let path = self.file_path(&config.gid, &key)?;
        let dir = self.group_dir(&config.gid);

        let lock = self.lock(&config.gid);
        let _guard = lock.write().await;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&dir, e))?;

        let temp = dir.join(format!("{TEMP_PREFIX}{}", Uuid::new_v4().simple()));
        if let Err(e) = fs::write(&temp, serialized).await {
            tracing::error!("Failed to write {}: {}", temp.display(), e);
            let _ = fs::remove_file(&temp).await;
            return Err(io_error(&temp, e));
        }
        if let Err(e) = fs::rename(&temp, &path).await {
            tracing::error!("Failed to replace {}: {}", path.display(), e);
            let _ = fs::remove_file(&temp).await;
            return Err(io_error(&path, e));
        }
        Ok(value)
    }

    pub async fn get(&self, config: &KeyConfig) -> Result<Value, Error> {
        match &config.key {
            None => Ok(Value::array(
                self.keys(&config.gid).await?.into_iter().map(Value::from),
            )),
            Some(key) => {
                let lock = self.lock(&config.gid);
                let _guard = lock.read().await;
                self.read(&config.gid, key).await
            }
        }
    }

    pub async fn del(&self, config: &KeyConfig) -> Result<Value, Error> {
        let key = config
            .key
            .as_ref()
            .ok_or_else(|| KvError::InvalidKey("a key is required to delete".to_string()))?;
        let lock = self.lock(&config.gid);
        let _guard = lock.write().await;
        let value = self.read(&config.gid, key).await?;
        let path = self.file_path(&config.gid, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(value),
            Err(e) if e.kind() == IoErrorKind::NotFound => Err(KvError::KeyNotFound(key.clone()).into()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    /// Stored keys of a gid, sorted. A gid with no directory yet has no keys.
    pub async fn keys(&self, gid: &str) -> Result<Vec<String>, Error> {
        let lock = self.lock(gid);
        let _guard = lock.read().await;
        let dir = self.group_dir(gid);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&dir, e)),
        };
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&dir, e))? {
            if let Some(name) = entry.file_name().to_str()
                && !name.starts_with(TEMP_PREFIX)
            {
                keys.push(name.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Callers hold the gid lock.
    async fn read(&self, gid: &str, key: &str) -> Result<Value, Error> {
        let path = self.file_path(gid, key)?;
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(KvError::KeyNotFound(key.to_string()).into());
            }
            Err(e) => return Err(io_error(&path, e)),
        };
        Ok(codec::deserialize(&text)?)
    }
}
