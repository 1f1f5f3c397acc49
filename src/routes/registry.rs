use super::service::ServiceObject;
use crate::codec::Value;
use crate::membership::types::LOCAL;

use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutesError {
    #[error("group not found: {0}")]
    GroupNotFound(String),
    #[error("service not found: {0}")]
    ServiceNotFound(String),
}

/// Address of a binding: a service name within a gid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    pub service: String,
    pub gid: String,
}

impl ServiceKey {
    pub fn new(service: impl Into<String>, gid: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            gid: gid.into(),
        }
    }

    pub fn local(service: impl Into<String>) -> Self {
        Self::new(service, LOCAL)
    }

    /// Accepts a bare service name (local gid) or `{service, gid?}`.
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(service) = value.as_str() {
            return Some(Self::local(service));
        }
        let service = value.get("service")?.as_str()?.to_string();
        let gid = match value.get("gid") {
            Some(gid) if !gid.is_nullish() => gid.as_str()?.to_string(),
            _ => LOCAL.to_string(),
        };
        Some(Self { service, gid })
    }

    pub fn to_value(&self) -> Value {
        Value::object([
            ("service".to_string(), Value::from(self.service.as_str())),
            ("gid".to_string(), Value::from(self.gid.as_str())),
        ])
    }
}

impl From<&str> for ServiceKey {
    fn from(service: &str) -> Self {
        Self::local(service)
    }
}

impl std::fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.gid, self.service)
    }
}

/// Registry of service bindings, two levels deep: gid, then service name.
#[derive(Debug, Default)]
pub struct Routes {
    services: DashMap<String, DashMap<String, Arc<ServiceObject>>>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ServiceKey) -> Result<Arc<ServiceObject>, RoutesError> {
        let group = self
            .services
            .get(&key.gid)
            .ok_or_else(|| RoutesError::GroupNotFound(key.gid.clone()))?;
        let service = group
            .get(&key.service)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RoutesError::ServiceNotFound(key.to_string()))?;
        Ok(service)
    }

    /// Binds a service, replacing any previous binding under the same key.
    pub fn put(&self, service: Arc<ServiceObject>, key: ServiceKey) {
        tracing::debug!("Binding {} ({} methods)", key, service.len());
        self.services
            .entry(key.gid)
            .or_default()
            .insert(key.service, service);
    }

    pub fn rem(&self, key: &ServiceKey) -> Result<Arc<ServiceObject>, RoutesError> {
        self.services
            .get(&key.gid)
            .and_then(|group| group.remove(&key.service).map(|(_, service)| service))
            .ok_or_else(|| RoutesError::ServiceNotFound(key.to_string()))
    }

    /// Drops every binding under a gid. Returns how many were removed.
    pub fn rem_group(&self, gid: &str) -> usize {
        self.services
            .remove(gid)
            .map(|(_, group)| group.len())
            .unwrap_or_default()
    }

    pub fn services(&self, gid: &str) -> Result<Vec<String>, RoutesError> {
        let group = self
            .services
            .get(gid)
            .ok_or_else(|| RoutesError::GroupNotFound(gid.to_string()))?;
        let mut names: Vec<String> = group.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }
}
