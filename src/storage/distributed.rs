use super::protocol::{KeyConfig, MEM_SERVICE, STORE_SERVICE};
use crate::codec::Value;
use crate::comm::{FanoutTarget, GroupComm, RemoteTarget};
use crate::error::Error;
use crate::identity::{self, Placement};
use crate::membership::GroupsError;
use crate::membership::types::Node;

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvKind {
    Mem,
    Store,
}

impl KvKind {
    pub fn service(&self) -> &'static str {
        match self {
            KvKind::Mem => MEM_SERVICE,
            KvKind::Store => STORE_SERVICE,
        }
    }
}

/// Group-wide key-value access. Each key lives on exactly one member, chosen by
/// the group's placement strategy over the member NIDs; the call is then a
/// single RPC to that member's local store with the gid attached.
pub struct DistributedKv {
    kind: KvKind,
    comm: GroupComm,
    placement: RwLock<Placement>,
}

impl DistributedKv {
    pub fn new(kind: KvKind, comm: GroupComm, placement: Placement) -> Self {
        Self {
            kind,
            comm,
            placement: RwLock::new(placement),
        }
    }

    pub fn kind(&self) -> KvKind {
        self.kind
    }

    pub fn placement(&self) -> Placement {
        *self.placement.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swaps the placement strategy. Keys already stored stay where they are.
    pub fn reconf(&self, placement: Placement) -> Placement {
        let mut current = self.placement.write().unwrap_or_else(PoisonError::into_inner);
        let previous = *current;
        *current = placement;
        tracing::info!(
            "{} placement for {} changed from {} to {}",
            self.kind.service(),
            self.comm.gid(),
            previous,
            placement
        );
        previous
    }

    /// Member responsible for `key` under the current membership.
    pub fn owner(&self, key: &str) -> Result<Node, Error> {
        let members = self.comm.members()?;
        let by_nid: BTreeMap<String, Node> = members
            .into_values()
            .map(|node| (node.nid(), node))
            .collect();
        let nids: Vec<String> = by_nid.keys().cloned().collect();
        let chosen = self
            .placement()
            .place(&identity::kid(key), &nids)
            .ok_or_else(|| GroupsError::Empty(self.comm.gid().to_string()))?;
        by_nid
            .get(&chosen)
            .cloned()
            .ok_or_else(|| GroupsError::Empty(self.comm.gid().to_string()).into())
    }

    fn key_config(&self, key: Option<String>) -> Value {
        KeyConfig::scoped(self.comm.gid(), key).to_value()
    }

    async fn call_owner(&self, key: &str, method: &str, message: Vec<Value>) -> Result<Value, Error> {
        let owner = self.owner(key)?;
        tracing::debug!(
            "{}.{} {} on {} ({})",
            self.kind.service(),
            method,
            key,
            owner,
            self.comm.gid()
        );
        let target = RemoteTarget::new(owner, self.kind.service(), method);
        self.comm.transport().call(&message, &target).await
    }

    /// Value under `key`, or every key stored in the group when `key` is `None`.
    pub async fn get(&self, key: Option<&str>) -> Result<Value, Error> {
        match key {
            None => Ok(Value::array(self.keys().await?.into_iter().map(Value::from))),
            Some(key) => {
                let message = vec![self.key_config(Some(key.to_string()))];
                self.call_owner(key, "get", message).await
            }
        }
    }

    pub async fn put(&self, value: Value, key: Option<&str>) -> Result<Value, Error> {
        let key = match key {
            Some(key) => key.to_string(),
            None => identity::content_id(&value)?,
        };
        let message = vec![value, self.key_config(Some(key.clone()))];
        self.call_owner(&key, "put", message).await
    }

    pub async fn del(&self, key: &str) -> Result<Value, Error> {
        let message = vec![self.key_config(Some(key.to_string()))];
        self.call_owner(key, "del", message).await
    }

    /// Keys stored for this gid across all members. Members that fail to answer
    /// are logged and skipped.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        let aggregate = self
            .comm
            .send(
                vec![self.key_config(None)],
                &FanoutTarget::new(self.kind.service(), "get"),
            )
            .await?;
        for (sid, error) in &aggregate.errors {
            tracing::warn!("Member {} could not list keys: {}", sid, error);
        }
        let mut keys: Vec<String> = aggregate
            .results
            .values()
            .filter_map(Value::items)
            .flatten()
            .filter_map(|key| key.as_str().map(str::to_string))
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}
