use super::distributed::DistributedGroups;
use super::groups::GroupTable;
use crate::comm::{GroupComm, Transport};
use crate::identity::Placement;
use crate::routes::DistributedRoutes;
use crate::status::DistributedStatus;
use crate::storage::{DistributedKv, KvKind};

use std::sync::Arc;

/// The distributed services of one group, all scoped to its gid.
pub struct GroupServices {
    pub gid: String,
    pub comm: GroupComm,
    pub status: DistributedStatus,
    pub groups: DistributedGroups,
    pub routes: DistributedRoutes,
    pub mem: DistributedKv,
    pub store: DistributedKv,
}

impl GroupServices {
    pub fn new(gid: &str, placement: Placement, table: Arc<GroupTable>, transport: Transport) -> Self {
        let comm = GroupComm::new(gid, table, transport);
        Self {
            gid: gid.to_string(),
            status: DistributedStatus::new(comm.clone()),
            groups: DistributedGroups::new(comm.clone()),
            routes: DistributedRoutes::new(comm.clone()),
            mem: DistributedKv::new(KvKind::Mem, comm.clone(), placement),
            store: DistributedKv::new(KvKind::Store, comm.clone(), placement),
            comm,
        }
    }

    pub fn kv(&self, kind: KvKind) -> &DistributedKv {
        match kind {
            KvKind::Mem => &self.mem,
            KvKind::Store => &self.store,
        }
    }
}
