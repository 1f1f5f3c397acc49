//! # Status
//!
//! Node self-description and lifecycle.
//!
//! ## Core Concepts
//! - **Local status**: identity, address, dispatched message count, process memory
//! - **Distributed status**: per-member answers; counters and memory are summed
//! - **Lifecycle**: `spawn` starts another node in this process, `stop` shuts one down

use crate::codec::Value;
use crate::comm::{Aggregate, FanoutTarget, GroupComm};
use crate::error::Error;
use crate::membership::GroupsError;
use crate::membership::distributed::DistributedGroups;
use crate::membership::types::Node;
use crate::node::NodeContext;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use sysinfo::{Pid, System};

pub const STATUS_SERVICE: &str = "status";

/// Keys whose per-member values add up to a meaningful group total.
pub const SUMMED_KEYS: [&str; 3] = ["counts", "heapTotal", "heapUsed"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("status key not found: {0}")]
    UnknownKey(String),
}

#[derive(Debug)]
pub struct LocalStatus {
    node: Node,
    counts: AtomicU64,
}

impl LocalStatus {
    pub fn new(node: Node) -> Self {
        Self {
            node,
            counts: AtomicU64::new(0),
        }
    }

    /// Called by the dispatcher once per routed message.
    pub fn record_message(&self) {
        self.counts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counts(&self) -> u64 {
        self.counts.load(Ordering::Relaxed)
    }

    pub fn get(&self, key: &str) -> Result<Value, StatusError> {
        let value = match key {
            "sid" => Value::from(self.node.sid()),
            "nid" => Value::from(self.node.nid()),
            "ip" => Value::from(self.node.ip.as_str()),
            "port" => Value::from(self.node.port),
            "counts" => Value::from(self.counts()),
            "heapTotal" => Value::from(process_memory().0),
            "heapUsed" => Value::from(process_memory().1),
            other => return Err(StatusError::UnknownKey(other.to_string())),
        };
        Ok(value)
    }
}

/// `(virtual, resident)` memory of this process in bytes.
fn process_memory() -> (u64, u64) {
    let mut system = System::new();
    let pid = Pid::from(std::process::id() as usize);
    if !system.refresh_process(pid) {
        return (0, 0);
    }
    system
        .process(pid)
        .map(|process| (process.virtual_memory(), process.memory()))
        .unwrap_or_default()
}

/// Sum of the numeric results, or `None` if any member answered with
/// something else.
pub fn total(aggregate: &Aggregate) -> Option<f64> {
    aggregate
        .results
        .values()
        .map(Value::as_f64)
        .sum::<Option<f64>>()
}

#[derive(Clone)]
pub struct DistributedStatus {
    comm: GroupComm,
    groups: DistributedGroups,
}

impl DistributedStatus {
    pub fn new(comm: GroupComm) -> Self {
        let groups = DistributedGroups::new(comm.clone());
        Self { comm, groups }
    }

    pub async fn get(&self, key: &str) -> Result<Aggregate, GroupsError> {
        self.comm
            .send(vec![Value::from(key)], &FanoutTarget::new(STATUS_SERVICE, "get"))
            .await
    }

    /// Starts `node` inside this process and adds it to the group on every
    /// current member.
    pub async fn spawn(&self, ctx: &Arc<NodeContext>, node: Node) -> Result<Aggregate, Error> {
        let node = ctx.spawn(node).await?;
        let aggregate = self.groups.add(self.comm.gid(), &node).await?;
        ctx.groups.add(self.comm.gid(), node);
        Ok(aggregate)
    }

    pub async fn stop(&self) -> Result<Aggregate, GroupsError> {
        self.comm
            .send(vec![], &FanoutTarget::new(STATUS_SERVICE, "stop"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_status_keys() {
        let node = Node::new("127.0.0.1", 8080);
        let status = LocalStatus::new(node.clone());

        assert_eq!(status.get("sid").unwrap(), Value::from(node.sid()));
        assert_eq!(status.get("port").unwrap(), Value::from(8080.0));
        assert_eq!(status.get("counts").unwrap(), Value::from(0.0));

        status.record_message();
        status.record_message();
        assert_eq!(status.get("counts").unwrap(), Value::from(2.0));
        assert!(status.get("heapUsed").unwrap().as_f64().is_some());
    }

    #[test]
    fn test_unknown_status_key() {
        let status = LocalStatus::new(Node::new("127.0.0.1", 8080));
        let error: Error = status.get("uptime").unwrap_err().into();
        assert_eq!(error.kind(), crate::error::ErrorKind::KeyNotFound);
    }

    #[test]
    fn test_total_requires_numbers() {
        let mut aggregate = Aggregate::default();
        aggregate.results.insert("a".to_string(), Value::from(2.0));
        aggregate.results.insert("b".to_string(), Value::from(3.0));
        assert_eq!(total(&aggregate), Some(5.0));

        aggregate.results.insert("c".to_string(), Value::from("x"));
        assert_eq!(total(&aggregate), None);
    }
}
