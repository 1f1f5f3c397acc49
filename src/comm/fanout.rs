use super::transport::Transport;
use super::types::{Envelope, RemoteTarget};
use crate::codec::Value;
use crate::error::Error;
use crate::membership::GroupsError;
use crate::membership::groups::GroupTable;
use crate::membership::types::{LOCAL, Members};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::task::{Id, JoinSet};

/// Service and method to invoke on every member of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutTarget {
    pub service: String,
    pub method: String,
    /// Gid used on the receiving side. `None` addresses each member's local
    /// services.
    pub gid: Option<String>,
}

impl FanoutTarget {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            gid: None,
        }
    }

    pub fn with_gid(mut self, gid: impl Into<String>) -> Self {
        self.gid = Some(gid.into());
        self
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let text = |key: &str| value.get(key).and_then(|v| v.as_str().map(str::to_string));
        Some(Self {
            service: text("service")?,
            method: text("method")?,
            gid: text("gid"),
        })
    }
}

/// Outcome of a fan-out, keyed by member SID. Every member lands in exactly
/// one of the two maps.
#[derive(Debug, Default)]
pub struct Aggregate {
    pub errors: BTreeMap<String, Error>,
    pub results: BTreeMap<String, Value>,
}

impl Aggregate {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn to_envelope(&self) -> Envelope {
        let errors = self
            .errors
            .iter()
            .map(|(sid, error)| (sid.clone(), error.to_value()));
        let results = self
            .results
            .iter()
            .map(|(sid, value)| (sid.clone(), value.clone()));
        Envelope::pair(Value::object(errors), Value::object(results))
    }

    /// Drains one task per member. `sids` names the member behind each task,
    /// so a task that panics or is cancelled still files an error for it.
    pub(crate) async fn gather(
        mut pending: JoinSet<Result<Envelope, Error>>,
        mut sids: HashMap<Id, String>,
    ) -> Self {
        let mut aggregate = Self::default();
        while let Some(joined) = pending.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(e) => {
                    tracing::error!("Fan-out task aborted: {}", e);
                    (e.id(), Err(Error::Handler(format!("member task failed: {e}"))))
                }
            };
            let Some(sid) = sids.remove(&id) else {
                tracing::error!("Fan-out task {} has no member", id);
                continue;
            };
            match outcome.and_then(Envelope::into_result) {
                Ok(value) => {
                    aggregate.results.insert(sid, value);
                }
                Err(error) => {
                    tracing::debug!("Member {} failed: {}", sid, error);
                    aggregate.errors.insert(sid, error);
                }
            }
        }
        aggregate
    }

    /// Reads an aggregate back out of a reply produced by `to_envelope`.
    pub fn from_envelope(envelope: &Envelope) -> Self {
        let errors = envelope
            .error
            .entries()
            .unwrap_or_default()
            .into_iter()
            .map(|(sid, error)| (sid, Error::from_value(&error)))
            .collect();
        let results = envelope
            .value
            .entries()
            .unwrap_or_default()
            .into_iter()
            .collect();
        Self { errors, results }
    }
}

/// Group-scoped fan-out: one RPC per member, awaited as a barrier.
#[derive(Clone)]
pub struct GroupComm {
    gid: String,
    table: Arc<GroupTable>,
    transport: Transport,
}

impl GroupComm {
    pub fn new(gid: impl Into<String>, table: Arc<GroupTable>, transport: Transport) -> Self {
        Self {
            gid: gid.into(),
            table,
            transport,
        }
    }

    pub fn gid(&self) -> &str {
        &self.gid
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Current members of the bound group.
    pub fn members(&self) -> Result<Members, GroupsError> {
        self.table.get(&self.gid)
    }

    pub async fn send(
        &self,
        message: Vec<Value>,
        target: &FanoutTarget,
    ) -> Result<Aggregate, GroupsError> {
        let members = self.members()?;
        Ok(self.send_to(members, message, target).await)
    }

    /// Sends to an explicit member snapshot. Resolves only once every member
    /// has either replied or failed.
    pub async fn send_to(
        &self,
        members: Members,
        message: Vec<Value>,
        target: &FanoutTarget,
    ) -> Aggregate {
        if members.is_empty() {
            return Aggregate::default();
        }

        tracing::debug!(
            "Fan-out {}.{} to {} member(s) of {}",
            target.service,
            target.method,
            members.len(),
            self.gid
        );

        let message = Arc::new(message);
        let gid = target.gid.clone().unwrap_or_else(|| LOCAL.to_string());
        let mut pending = JoinSet::new();
        let mut sids = HashMap::with_capacity(members.len());
        for (sid, node) in members {
            let transport = self.transport.clone();
            let message = message.clone();
            let remote =
                RemoteTarget::new(node, &target.service, &target.method).with_gid(gid.clone());
            let handle = pending.spawn(async move {
                transport.send(&message, &remote).await.map_err(Error::from)
            });
            sids.insert(handle.id(), sid);
        }
        Aggregate::gather(pending, sids).await
    }
}
