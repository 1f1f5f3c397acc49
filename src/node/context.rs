use super::server::{self, NodeHandle};
use super::services;
use crate::codec::{Callable, Value};
use crate::comm::{Envelope, Transport};
use crate::config::NodeConfig;
use crate::error::Error;
use crate::membership::bindings::GroupServices;
use crate::membership::groups::GroupTable;
use crate::membership::service::LocalGroups;
use crate::membership::types::{ALL, Node, members_of};
use crate::routes::{RPC_SERVICE, Routes, RpcTable, ServiceKey};
use crate::status::LocalStatus;
use crate::storage::{DiskStore, MemStore};

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Notify;

/// Everything one node owns. Several nodes can live in one process, each with
/// its own context; nothing here is global.
pub struct NodeContext {
    node: Node,
    config: NodeConfig,
    pub status: LocalStatus,
    pub groups: LocalGroups,
    pub routes: Arc<Routes>,
    pub comm: Transport,
    pub mem: MemStore,
    pub store: DiskStore,
    pub rpc: RpcTable,
    children: DashMap<String, NodeHandle>,
    shutdown: Notify,
}

impl NodeContext {
    /// Builds the context with the local services bound and `all` holding
    /// just this node.
    pub fn new(config: NodeConfig) -> Arc<Self> {
        let node = config.node.clone();
        let comm = Transport::new(config.request_timeout);
        let routes = Arc::new(Routes::new());
        let groups = LocalGroups::new(Arc::new(GroupTable::new()), routes.clone(), comm.clone());
        let rpc = RpcTable::new();

        for service in services::local_services() {
            let key = ServiceKey::local(service.name());
            routes.put(Arc::new(service), key);
        }
        routes.put(rpc.service(), ServiceKey::local(RPC_SERVICE));
        groups.put(ALL, members_of([node.clone()]));

        Arc::new(Self {
            status: LocalStatus::new(node.clone()),
            store: DiskStore::new(config.store_dir()),
            mem: MemStore::new(),
            node,
            config,
            groups,
            routes,
            comm,
            rpc,
            children: DashMap::new(),
            shutdown: Notify::new(),
        })
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Distributed services of a group this node knows.
    pub fn group(&self, gid: &str) -> Option<Arc<GroupServices>> {
        self.groups.services(gid)
    }

    /// Exports `handler` through this node's RPC table.
    pub fn export<F, Fut>(&self, handler: F) -> Callable
    where
        F: Fn(Arc<NodeContext>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Envelope> + Send + 'static,
    {
        self.rpc.export(&self.node, handler)
    }

    /// Starts another node in this process and adds it to `all`.
    pub async fn spawn(self: &Arc<Self>, node: Node) -> Result<Node, Error> {
        let config = NodeConfig::new(node.clone()).with_request_timeout(self.config.request_timeout);
        let handle = Box::pin(server::start(config))
            .await
            .map_err(|e| Error::Handler(format!("failed to spawn node {node}: {e}")))?;
        let spawned = handle.node().clone();
        self.groups.add(ALL, spawned.clone());
        self.children.insert(spawned.sid(), handle);
        tracing::info!("Spawned node {} ({})", spawned, spawned.sid());
        Ok(spawned)
    }

    /// Nodes started through [`spawn`](Self::spawn) that are still tracked.
    pub fn children(&self) -> Vec<Node> {
        self.children
            .iter()
            .map(|entry| entry.value().node().clone())
            .collect()
    }

    /// Asks the server to shut down once in-flight requests complete.
    pub fn stop(&self) {
        tracing::info!("Stopping node {}", self.node);
        self.shutdown.notify_one();
    }

    pub(crate) async fn stopped(&self) {
        self.shutdown.notified().await;
    }
}
