//! Fixed table of functions that may be referenced by name on the wire.
//!
//! A `nativefunction` node decodes to a live reference into this table on any
//! node, which is how placement strategies travel inside group configurations.

use super::value::{Callable, Value};
use crate::error::{DispatchError, Error};
use crate::identity::{self, Placement};
use crate::membership::types::Node;

pub type NativeFn = fn(&[Value]) -> Result<Value, Error>;

/// Module of the identity helpers.
pub const ID_MODULE: &str = "id";

static NATIVES: &[(&str, &str, NativeFn)] = &[
    (ID_MODULE, "getID", get_id),
    (ID_MODULE, "getNID", get_nid),
    (ID_MODULE, "getSID", get_sid),
    (ID_MODULE, "naiveHash", naive_hash),
    (ID_MODULE, "consistentHash", consistent_hash),
    (ID_MODULE, "rendezvousHash", rendezvous_hash),
];

pub fn resolve(module: &str, path: &[String]) -> Option<NativeFn> {
    let [name] = path else {
        return None;
    };
    NATIVES
        .iter()
        .find(|(m, n, _)| *m == module && n == name)
        .map(|(_, _, f)| *f)
}

/// Callable referring to a registered native.
pub fn native(module: &str, name: &str) -> Callable {
    Callable::Native {
        module: module.to_string(),
        path: vec![name.to_string()],
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn node_arg(args: &[Value]) -> Result<Node, Error> {
    Node::from_value(&arg(args, 0))
        .ok_or_else(|| DispatchError::BadRequest("expected a node {ip, port}".to_string()).into())
}

fn get_id(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::String(identity::content_id(&arg(args, 0))?))
}

fn get_nid(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::String(node_arg(args)?.nid()))
}

fn get_sid(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::String(node_arg(args)?.sid()))
}

fn place(strategy: Placement, args: &[Value]) -> Result<Value, Error> {
    let kid = arg(args, 0)
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| DispatchError::BadRequest("expected a key id".to_string()))?;
    let nids: Vec<String> = arg(args, 1)
        .items()
        .ok_or_else(|| DispatchError::BadRequest("expected a list of node ids".to_string()))?
        .iter()
        .filter_map(|nid| nid.as_str().map(str::to_string))
        .collect();
    Ok(strategy.place(&kid, &nids).into())
}

fn naive_hash(args: &[Value]) -> Result<Value, Error> {
    place(Placement::Naive, args)
}

fn consistent_hash(args: &[Value]) -> Result<Value, Error> {
    place(Placement::Consistent, args)
}

fn rendezvous_hash(args: &[Value]) -> Result<Value, Error> {
    place(Placement::Rendezvous, args)
}
