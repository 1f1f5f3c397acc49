use super::protocol::{KeyConfig, KvError};
use crate::codec::Value;
use crate::error::Error;
use crate::identity;

use dashmap::DashMap;

/// Node-local in-memory store, partitioned by gid.
#[derive(Debug, Default)]
pub struct MemStore {
    data: DashMap<String, DashMap<String, Value>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, keyed by its content id when no key is given. Writing
    /// the same `(key, value)` twice leaves the store unchanged.
    pub fn put(&self, value: Value, config: &KeyConfig) -> Result<Value, Error> {
        let key = match &config.key {
            Some(key) => key.clone(),
            None => identity::content_id(&value)?,
        };
        self.data
            .entry(config.gid.clone())
            .or_default()
            .insert(key, value.clone());
        Ok(value)
    }

    /// Value under the key, or the sorted key list of the gid when no key is given.
    pub fn get(&self, config: &KeyConfig) -> Result<Value, Error> {
        let Some(key) = &config.key else {
            return Ok(Value::array(self.keys(&config.gid).into_iter().map(Value::from)));
        };
        let value = self
            .data
            .get(&config.gid)
            .and_then(|group| {
                let value = group.get(key)?.value().clone();
                Some(value)
            })
            .ok_or_else(|| KvError::KeyNotFound(key.clone()))?;
        Ok(value)
    }

    pub fn del(&self, config: &KeyConfig) -> Result<Value, Error> {
        let key = config
            .key
            .as_ref()
            .ok_or_else(|| KvError::InvalidKey("a key is required to delete".to_string()))?;
        let removed = self
            .data
            .get(&config.gid)
            .and_then(|group| group.remove(key).map(|(_, value)| value))
            .ok_or_else(|| KvError::KeyNotFound(key.clone()))?;
        Ok(removed)
    }

    pub fn keys(&self, gid: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .data
            .get(gid)
            .map(|group| group.iter().map(|e| e.key().clone()).collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}
