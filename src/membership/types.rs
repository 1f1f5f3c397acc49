use crate::codec::Value;
use crate::identity::{self, Placement};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reserved group every other group is merged into.
pub const ALL: &str = "all";
/// Gid of the node-local services.
pub const LOCAL: &str = "local";

/// Network address of a node.
///
/// The identity of a node (its NID, and the SID derived from it) depends only on
/// `ip` and `port`, so two descriptors with the same address are the same node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Node {
    pub ip: String,
    pub port: u16,
}

impl Node {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }

    /// Full 64-hex-digit node identifier.
    pub fn nid(&self) -> String {
        identity::nid(self)
    }

    /// Short identifier used as the key of group member maps.
    pub fn sid(&self) -> String {
        identity::sid(self)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn to_value(&self) -> Value {
        Value::object([
            ("ip".to_string(), Value::from(self.ip.as_str())),
            ("port".to_string(), Value::from(self.port)),
        ])
    }

    /// Reads `{ip, port}` out of a mapping value.
    pub fn from_value(value: &Value) -> Option<Self> {
        let ip = value.get("ip")?.as_str()?.to_string();
        let port = value.get("port")?.as_f64()?;
        if !(0.0..=u16::MAX as f64).contains(&port) || port.fract() != 0.0 {
            return None;
        }
        Some(Self::new(ip, port as u16))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Membership of one group, keyed by SID.
pub type Members = BTreeMap<String, Node>;

pub fn members_of(nodes: impl IntoIterator<Item = Node>) -> Members {
    nodes.into_iter().map(|node| (node.sid(), node)).collect()
}

pub fn members_to_value(members: &Members) -> Value {
    Value::object(
        members
            .iter()
            .map(|(sid, node)| (sid.clone(), node.to_value())),
    )
}

/// Parses a `{sid: {ip, port}}` mapping. Entries are re-keyed by the SID computed
/// from the address, so a caller cannot smuggle a mismatched key in.
pub fn members_from_value(value: &Value) -> Option<Members> {
    let entries = value.entries()?;
    let mut members = Members::new();
    for (_, node) in entries {
        let node = Node::from_value(&node)?;
        members.insert(node.sid(), node);
    }
    Some(members)
}

/// A group member given either as a full descriptor or by its SID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRef {
    Node(Node),
    Sid(String),
}

impl MemberRef {
    pub fn sid(&self) -> String {
        match self {
            MemberRef::Node(node) => node.sid(),
            MemberRef::Sid(sid) => sid.clone(),
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(sid) = value.as_str() {
            return Some(MemberRef::Sid(sid.to_string()));
        }
        Node::from_value(value).map(MemberRef::Node)
    }

    pub fn to_value(&self) -> Value {
        match self {
            MemberRef::Node(node) => node.to_value(),
            MemberRef::Sid(sid) => Value::from(sid.as_str()),
        }
    }
}

impl From<Node> for MemberRef {
    fn from(node: Node) -> Self {
        MemberRef::Node(node)
    }
}

/// Normalized `groups.put` configuration: a bare gid, or `{gid, hash}` where
/// `hash` picks the placement strategy of the group's KV services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupConfig {
    pub gid: String,
    pub hash: Option<Placement>,
}

impl GroupConfig {
    pub fn new(gid: impl Into<String>) -> Self {
        Self {
            gid: gid.into(),
            hash: None,
        }
    }

    pub fn with_hash(mut self, hash: Placement) -> Self {
        self.hash = Some(hash);
        self
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(gid) = value.as_str() {
            return Some(Self::new(gid));
        }
        let gid = value.get("gid")?.as_str()?.to_string();
        let hash = match value.get("hash") {
            None => None,
            Some(hash) if hash.is_nullish() => None,
            Some(hash) => Some(Placement::from_value(&hash)?),
        };
        Some(Self { gid, hash })
    }

    pub fn to_value(&self) -> Value {
        match self.hash {
            None => Value::from(self.gid.as_str()),
            Some(hash) => Value::object([
                ("gid".to_string(), Value::from(self.gid.as_str())),
                ("hash".to_string(), hash.to_value()),
            ]),
        }
    }
}

impl From<&str> for GroupConfig {
    fn from(gid: &str) -> Self {
        Self::new(gid)
    }
}
