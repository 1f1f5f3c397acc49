//! Storage Protocol
//!
//! Key addressing shared by the in-memory and persistent stores, and the
//! errors both of them raise.
//!
//! A key configuration travels as `null`, a bare key string (gid `local`), or
//! `{key, gid}`. `null` (or a `null` key) means "no key": `put` derives one from
//! the value's content and `get` lists the keys stored under the gid.

use crate::codec::Value;
use crate::error::ErrorKind;
use crate::membership::types::LOCAL;

/// Service name of the in-memory store.
pub const MEM_SERVICE: &str = "mem";
/// Service name of the persistent store.
pub const STORE_SERVICE: &str = "store";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KvError {
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("store I/O failed at {path}: {message}")]
    Io { path: String, message: String },
}

impl KvError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KvError::KeyNotFound(_) => ErrorKind::KeyNotFound,
            KvError::InvalidKey(_) => ErrorKind::BadRequest,
            KvError::Io { .. } => ErrorKind::StorageError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConfig {
    pub gid: String,
    pub key: Option<String>,
}

impl KeyConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            gid: LOCAL.to_string(),
            key: Some(key.into()),
        }
    }

    /// No key, under `gid`.
    pub fn all(gid: impl Into<String>) -> Self {
        Self {
            gid: gid.into(),
            key: None,
        }
    }

    pub fn scoped(gid: impl Into<String>, key: Option<String>) -> Self {
        Self {
            gid: gid.into(),
            key,
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null | Value::Undefined => Some(Self::all(LOCAL)),
            Value::String(key) => Some(Self::new(key.as_str())),
            Value::Object(_) => {
                let gid = match value.get("gid") {
                    Some(gid) if !gid.is_nullish() => gid.as_str()?.to_string(),
                    _ => LOCAL.to_string(),
                };
                let key = match value.get("key") {
                    Some(key) if !key.is_nullish() => Some(key.as_str()?.to_string()),
                    _ => None,
                };
                Some(Self { gid, key })
            }
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        Value::object([
            ("key".to_string(), Value::from(self.key.clone())),
            ("gid".to_string(), Value::from(self.gid.as_str())),
        ])
    }
}

/// Strips everything but ASCII letters and digits, for use as a file name.
pub fn sanitize(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_alphanumeric).collect()
}
