use super::bindings::GroupServices;
use super::groups::{GroupTable, GroupsError};
use super::types::{GroupConfig, MemberRef, Members, Node};
use crate::comm::Transport;
use crate::node::services;
use crate::routes::{Routes, ServiceKey};

use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// The node's `groups` service: the group table plus the distributed bindings
/// each group gets once it is known.
///
/// Putting a group (re)creates its [`GroupServices`] and binds them in the
/// routes under the group's gid, so `/{gid}/{service}/{method}` becomes
/// routable. Deleting the group drops both.
pub struct LocalGroups {
    table: Arc<GroupTable>,
    bindings: DashMap<String, Arc<GroupServices>>,
    routes: Arc<Routes>,
    transport: Transport,
}

impl LocalGroups {
    pub fn new(table: Arc<GroupTable>, routes: Arc<Routes>, transport: Transport) -> Self {
        Self {
            table,
            bindings: DashMap::new(),
            routes,
            transport,
        }
    }

    pub fn table(&self) -> &Arc<GroupTable> {
        &self.table
    }

    pub fn get(&self, name: &str) -> Result<Members, GroupsError> {
        self.table.get(name)
    }

    pub fn put(&self, config: impl Into<GroupConfig>, members: Members) -> Members {
        let config = config.into();
        let members = self.table.put(&config.gid, members);
        self.bind(&config);
        info!(
            "Group {} set to {} member(s) ({} placement)",
            config.gid,
            members.len(),
            config.hash.unwrap_or_default()
        );
        members
    }

    pub fn del(&self, name: &str) -> Result<Members, GroupsError> {
        let members = self.table.del(name)?;
        self.bindings.remove(name);
        let unbound = self.routes.rem_group(name);
        info!("Group {} deleted ({} binding(s) dropped)", name, unbound);
        Ok(members)
    }

    /// Adds a node to an existing group; `None` (a no-op) if the group is unknown.
    pub fn add(&self, name: &str, node: Node) -> Option<Members> {
        let sid = node.sid();
        let members = self.table.add(name, node)?;
        info!("Added {} to group {}", sid, name);
        Some(members)
    }

    pub fn rem(&self, name: &str, member: &MemberRef) -> Option<Members> {
        let sid = member.sid();
        let members = self.table.rem(name, &sid)?;
        info!("Removed {} from group {}", sid, name);
        Some(members)
    }

    /// Distributed services of a known group.
    pub fn services(&self, gid: &str) -> Option<Arc<GroupServices>> {
        self.bindings.get(gid).map(|entry| entry.value().clone())
    }

    fn bind(&self, config: &GroupConfig) {
        let bound = Arc::new(GroupServices::new(
            &config.gid,
            config.hash.unwrap_or_default(),
            self.table.clone(),
            self.transport.clone(),
        ));
        for service in services::group_services(&bound) {
            let key = ServiceKey::new(service.name(), config.gid.as_str());
            self.routes.put(Arc::new(service), key);
        }
        self.bindings.insert(config.gid.clone(), bound);
    }
}
