use super::groups::GroupsError;
use super::types::{GroupConfig, MemberRef, Members, Node, members_to_value};
use crate::codec::Value;
use crate::comm::{Aggregate, FanoutTarget, GroupComm};

pub const GROUPS_SERVICE: &str = "groups";

/// Group operations applied on every member of a group.
///
/// Each call is relayed to the `groups` service of every current member; the
/// member views converge once the aggregate returns, with no ordering between
/// concurrent callers.
#[derive(Clone)]
pub struct DistributedGroups {
    comm: GroupComm,
}

impl DistributedGroups {
    pub fn new(comm: GroupComm) -> Self {
        Self { comm }
    }

    async fn relay(&self, method: &str, message: Vec<Value>) -> Result<Aggregate, GroupsError> {
        self.comm
            .send(message, &FanoutTarget::new(GROUPS_SERVICE, method))
            .await
    }

    pub async fn get(&self, name: &str) -> Result<Aggregate, GroupsError> {
        self.relay("get", vec![Value::from(name)]).await
    }

    pub async fn put(
        &self,
        config: &GroupConfig,
        members: &Members,
    ) -> Result<Aggregate, GroupsError> {
        self.relay("put", vec![config.to_value(), members_to_value(members)])
            .await
    }

    pub async fn del(&self, name: &str) -> Result<Aggregate, GroupsError> {
        self.relay("del", vec![Value::from(name)]).await
    }

    pub async fn add(&self, name: &str, node: &Node) -> Result<Aggregate, GroupsError> {
        self.relay("add", vec![Value::from(name), node.to_value()])
            .await
    }

    pub async fn rem(&self, name: &str, member: &MemberRef) -> Result<Aggregate, GroupsError> {
        self.relay("rem", vec![Value::from(name), member.to_value()])
            .await
    }
}
