use super::types::{ALL, Members, Node};
use crate::error::ErrorKind;

use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupsError {
    #[error("group not found: {0}")]
    GroupNotFound(String),
    #[error("group {0} has no members")]
    Empty(String),
}

impl GroupsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GroupsError::GroupNotFound(_) => ErrorKind::GroupNotFound,
            GroupsError::Empty(_) => ErrorKind::NotFound,
        }
    }
}

/// Per-node view of every group it knows about.
///
/// Any change to a group other than `all` is mirrored into `all`, so `all`
/// stays a superset of everything the node has seen. Removals from `all`
/// itself are not propagated back.
#[derive(Debug, Default)]
pub struct GroupTable {
    groups: DashMap<String, Members>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Result<Members, GroupsError> {
        self.groups
            .get(name)
            .map(|members| members.clone())
            .ok_or_else(|| GroupsError::GroupNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Replaces a group wholesale.
    pub fn put(&self, name: &str, members: Members) -> Members {
        if name != ALL {
            self.groups
                .entry(ALL.to_string())
                .or_default()
                .extend(members.clone());
        }
        self.groups.insert(name.to_string(), members.clone());
        members
    }

    pub fn del(&self, name: &str) -> Result<Members, GroupsError> {
        self.groups
            .remove(name)
            .map(|(_, members)| members)
            .ok_or_else(|| GroupsError::GroupNotFound(name.to_string()))
    }

    /// Adds a node to an existing group. `None` when the group is unknown.
    pub fn add(&self, name: &str, node: Node) -> Option<Members> {
        let sid = node.sid();
        let updated = {
            let mut group = self.groups.get_mut(name)?;
            group.insert(sid.clone(), node.clone());
            group.clone()
        };
        if name != ALL {
            self.groups
                .entry(ALL.to_string())
                .or_default()
                .insert(sid, node);
        }
        Some(updated)
    }

    /// Removes a member by SID. `None` when the group is unknown.
    pub fn rem(&self, name: &str, sid: &str) -> Option<Members> {
        let updated = {
            let mut group = self.groups.get_mut(name)?;
            group.remove(sid);
            group.clone()
        };
        if name != ALL
            && let Some(mut all) = self.groups.get_mut(ALL)
        {
            all.remove(sid);
        }
        Some(updated)
    }
}
