use crate::codec::Value;
use crate::comm::{Aggregate, FanoutTarget, GroupComm};
use crate::membership::GroupsError;

pub const ROUTES_SERVICE: &str = "routes";

/// Installs or removes a service on every member of a group.
#[derive(Clone)]
pub struct DistributedRoutes {
    comm: GroupComm,
}

impl DistributedRoutes {
    pub fn new(comm: GroupComm) -> Self {
        Self { comm }
    }

    /// `descriptor` is a `{method: callable}` mapping; each member binds a
    /// service named `name` whose methods call those callables.
    pub async fn put(&self, descriptor: Value, name: &str) -> Result<Aggregate, GroupsError> {
        self.comm
            .send(
                vec![descriptor, Value::from(name)],
                &FanoutTarget::new(ROUTES_SERVICE, "put"),
            )
            .await
    }

    pub async fn rem(&self, name: &str) -> Result<Aggregate, GroupsError> {
        self.comm
            .send(vec![Value::from(name)], &FanoutTarget::new(ROUTES_SERVICE, "rem"))
            .await
    }
}
