use super::id::{compare_ids, id_mod, kid};
use crate::codec::natives::{ID_MODULE, native};
use crate::codec::{Callable, Value};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Strategy mapping a key id to one of a set of node ids.
///
/// All three are pure functions of `(kid, nids)`: every node that sees the same
/// membership picks the same owner, without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Placement {
    #[default]
    Naive,
    Consistent,
    Rendezvous,
}

impl Placement {
    pub const ALL: [Placement; 3] = [
        Placement::Naive,
        Placement::Consistent,
        Placement::Rendezvous,
    ];

    /// Name of the matching entry in the native table.
    pub fn name(&self) -> &'static str {
        match self {
            Placement::Naive => "naiveHash",
            Placement::Consistent => "consistentHash",
            Placement::Rendezvous => "rendezvousHash",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name).or(match name {
            "naive" => Some(Placement::Naive),
            "consistent" => Some(Placement::Consistent),
            "rendezvous" => Some(Placement::Rendezvous),
            _ => None,
        })
    }

    pub fn place(&self, kid: &str, nids: &[String]) -> Option<String> {
        match self {
            Placement::Naive => naive_hash(kid, nids),
            Placement::Consistent => consistent_hash(kid, nids),
            Placement::Rendezvous => rendezvous_hash(kid, nids),
        }
    }

    pub fn callable(&self) -> Callable {
        native(ID_MODULE, self.name())
    }

    pub fn to_value(&self) -> Value {
        Value::Function(self.callable())
    }

    /// Accepts a native reference (`id.consistentHash`) or a bare name.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Function(Callable::Native { module, path })
                if module == ID_MODULE && path.len() == 1 =>
            {
                Self::from_name(&path[0])
            }
            Value::String(name) => Self::from_name(name),
            _ => None,
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sorts the ids and picks index `kid mod N`.
pub fn naive_hash(kid: &str, nids: &[String]) -> Option<String> {
    if nids.is_empty() {
        return None;
    }
    let mut sorted = nids.to_vec();
    sorted.sort();
    Some(sorted[id_mod(kid, sorted.len())].clone())
}

/// First id on the ring strictly after the key, wrapping to the smallest.
pub fn consistent_hash(kid: &str, nids: &[String]) -> Option<String> {
    let mut ring = nids.to_vec();
    ring.sort_by(|a, b| compare_ids(a, b));
    ring.dedup();
    let first = ring.first()?.clone();
    Some(
        ring.into_iter()
            .find(|nid| compare_ids(nid, kid) == Ordering::Greater)
            .unwrap_or(first),
    )
}

/// Highest `hash(kid ++ nid)` wins; ties keep the earliest id.
pub fn rendezvous_hash(key_id: &str, nids: &[String]) -> Option<String> {
    let mut best: Option<(String, &String)> = None;
    for nid in nids {
        let score = kid(&format!("{key_id}{nid}"));
        let wins = match &best {
            None => true,
            Some((top, _)) => compare_ids(&score, top) == Ordering::Greater,
        };
        if wins {
            best = Some((score, nid));
        }
    }
    best.map(|(_, nid)| nid.clone())
}
