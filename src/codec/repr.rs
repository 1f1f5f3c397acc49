use crate::membership::types::Node;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wire form of a [`Value`](super::Value). Every node is a JSON object tagged
/// by `type`; composites carry the `id` that later `reference` nodes point at.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum Repr {
    Null,
    Undefined,
    Boolean {
        value: String,
    },
    Number {
        value: String,
    },
    String {
        value: String,
    },
    Object {
        id: u64,
        value: BTreeMap<String, Repr>,
    },
    Array {
        id: u64,
        value: Vec<Repr>,
    },
    Date {
        id: u64,
        value: String,
    },
    Error {
        id: u64,
        name: String,
        message: String,
        fields: BTreeMap<String, Repr>,
    },
    Reference {
        id: u64,
    },
    #[serde(rename = "nativefunction")]
    Native {
        module: String,
        path: Vec<String>,
    },
    Stub {
        node: Node,
        method: String,
    },
    /// Function source text. Accepted by the parser only so it can be refused
    /// with `UnsupportedType` instead of a generic format error.
    Function {
        #[allow(dead_code)]
        value: String,
    },
}
