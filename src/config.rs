//! Node configuration.

use crate::membership::types::Node;

use std::path::PathBuf;
use std::time::Duration;

/// Directory under which each node keeps its persistent store by default.
pub const DEFAULT_STORE_DIR: &str = "store_data";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address to bind. Port 0 binds an ephemeral port; the node's identity is
    /// then taken from the address actually bound.
    pub node: Node,
    /// Root of the persistent store. Defaults to `store_data/<nid>`.
    pub store_root: Option<PathBuf>,
    /// Upper bound on every outgoing RPC.
    pub request_timeout: Duration,
}

impl NodeConfig {
    pub fn new(node: Node) -> Self {
        Self {
            node,
            store_root: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_store_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.store_root = Some(root.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn store_dir(&self) -> PathBuf {
        self.store_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR).join(self.node.nid()))
    }
}
