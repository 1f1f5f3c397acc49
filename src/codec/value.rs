//! In-memory value model carried by the codec.
//!
//! Composite values (mappings, sequences, dates and errors) are reference types:
//! cloning a `Value` clones the handle, not the contents, so a graph built from
//! them may alias and may contain cycles. The encoder tracks composites by
//! pointer identity, which is what lets `serialize` emit back-references.

use super::CodecError;
use crate::membership::types::Node;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub type Shared<T> = Arc<RwLock<T>>;

/// A dynamically typed value as it travels between nodes.
#[derive(Clone)]
pub enum Value {
    Null,
    Undefined,
    Bool(bool),
    Number(f64),
    String(String),
    Object(Shared<BTreeMap<String, Value>>),
    Array(Shared<Vec<Value>>),
    Date(Arc<DateTime<Utc>>),
    Error(Shared<ErrorValue>),
    Function(Callable),
}

/// An error carried as data: a name, a message and any custom fields.
#[derive(Debug, Clone, Default)]
pub struct ErrorValue {
    pub name: String,
    pub message: String,
    pub fields: BTreeMap<String, Value>,
}

impl ErrorValue {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// A function reference that can cross the wire.
///
/// `Native` names an entry of the fixed native table (see `codec::natives`).
/// `Stub` points at a function exported through a node's RPC table; calling it
/// becomes an ordinary RPC to `node` on the `rpc` service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Callable {
    Native { module: String, path: Vec<String> },
    Stub { node: Node, method: String },
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl Value {
    pub fn object(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        Value::Object(Arc::new(RwLock::new(entries.into_iter().collect())))
    }

    pub fn empty_object() -> Self {
        Value::object(std::iter::empty())
    }

    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(Arc::new(RwLock::new(items.into_iter().collect())))
    }

    pub fn date(at: DateTime<Utc>) -> Self {
        Value::Date(Arc::new(at))
    }

    pub fn error(error: ErrorValue) -> Self {
        Value::Error(Arc::new(RwLock::new(error)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Date(_) => "date",
            Value::Error(_) => "error",
            Value::Function(_) => "function",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Value::Function(callable) => Some(callable),
            _ => None,
        }
    }

    /// Snapshot of an error value.
    pub fn as_error(&self) -> Option<ErrorValue> {
        match self {
            Value::Error(error) => Some(read(error).clone()),
            _ => None,
        }
    }

    /// Looks a key up in a mapping.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(map) => read(map).get(key).cloned(),
            _ => None,
        }
    }

    /// Inserts into a mapping in place; every alias of the mapping observes it.
    pub fn set(&self, key: impl Into<String>, value: Value) -> bool {
        match self {
            Value::Object(map) => {
                write(map).insert(key.into(), value);
                true
            }
            _ => false,
        }
    }

    pub fn push(&self, value: Value) -> bool {
        match self {
            Value::Array(items) => {
                write(items).push(value);
                true
            }
            _ => false,
        }
    }

    /// Entries of a mapping, in key order.
    pub fn entries(&self) -> Option<Vec<(String, Value)>> {
        match self {
            Value::Object(map) => Some(
                read(map)
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Items of a sequence.
    pub fn items(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(read(items).clone()),
            _ => None,
        }
    }

    /// Pointer identity of a composite value.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Value::Object(map) => Some(Arc::as_ptr(map) as *const () as usize),
            Value::Array(items) => Some(Arc::as_ptr(items) as *const () as usize),
            Value::Date(at) => Some(Arc::as_ptr(at) as *const () as usize),
            Value::Error(error) => Some(Arc::as_ptr(error) as *const () as usize),
            _ => None,
        }
    }

    /// True when both handles point at the same composite.
    pub fn same(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Builds a value from any serde-serializable type.
    pub fn from_serde<T: Serialize + ?Sized>(value: &T) -> Result<Self, CodecError> {
        let json =
            serde_json::to_value(value).map_err(|e| CodecError::UnsupportedType(e.to_string()))?;
        Ok(Value::from_json(json))
    }

    /// Reads a value back into a serde type. Cyclic graphs and callables have no
    /// serde representation and fail with `UnsupportedType`.
    pub fn to_serde<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        let json = self.to_json()?;
        serde_json::from_value(json).map_err(|e| CodecError::UnsupportedType(e.to_string()))
    }

    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from_json)),
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from_json(v))))
            }
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, CodecError> {
        to_json(self, &mut HashSet::new())
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

fn to_json(value: &Value, path: &mut HashSet<usize>) -> Result<serde_json::Value, CodecError> {
    if let Some(identity) = value.identity()
        && !path.insert(identity)
    {
        return Err(CodecError::UnsupportedType(
            "cyclic value has no plain representation".to_string(),
        ));
    }

    let json = match value {
        Value::Null | Value::Undefined => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Date(at) => {
            serde_json::Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }
        Value::Object(map) => {
            let entries: Vec<(String, Value)> = read(map)
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let mut out = serde_json::Map::new();
            for (key, item) in entries {
                out.insert(key, to_json(&item, path)?);
            }
            serde_json::Value::Object(out)
        }
        Value::Array(items) => {
            let items = read(items).clone();
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                out.push(to_json(item, path)?);
            }
            serde_json::Value::Array(out)
        }
        Value::Error(error) => {
            let error = read(error).clone();
            let mut out = serde_json::Map::new();
            for (key, item) in &error.fields {
                out.insert(key.clone(), to_json(item, path)?);
            }
            out.insert("name".to_string(), serde_json::Value::String(error.name));
            out.insert(
                "message".to_string(),
                serde_json::Value::String(error.message),
            );
            serde_json::Value::Object(out)
        }
        Value::Function(_) => {
            return Err(CodecError::UnsupportedType(
                "functions have no plain representation".to_string(),
            ));
        }
    };

    if let Some(identity) = value.identity() {
        path.remove(&identity);
    }
    Ok(json)
}

/// Structural, cycle-aware equality. Two composites already being compared
/// higher up the stack are assumed equal, which terminates on cycles.
fn structural_eq(a: &Value, b: &Value, assumed: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Date(x), Value::Date(y)) => x == y,
        (Value::Function(x), Value::Function(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => {
            if Arc::ptr_eq(x, y) || !assumed.insert(pair(a, b)) {
                return true;
            }
            let xs: Vec<(String, Value)> = read(x).iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            let ys: Vec<(String, Value)> = read(y).iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && structural_eq(va, vb, assumed))
        }
        (Value::Array(x), Value::Array(y)) => {
            if Arc::ptr_eq(x, y) || !assumed.insert(pair(a, b)) {
                return true;
            }
            let xs = read(x).clone();
            let ys = read(y).clone();
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys.iter())
                    .all(|(va, vb)| structural_eq(va, vb, assumed))
        }
        (Value::Error(x), Value::Error(y)) => {
            if Arc::ptr_eq(x, y) || !assumed.insert(pair(a, b)) {
                return true;
            }
            let xe = read(x).clone();
            let ye = read(y).clone();
            xe.name == ye.name
                && xe.message == ye.message
                && xe.fields.len() == ye.fields.len()
                && xe
                    .fields
                    .iter()
                    .zip(ye.fields.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && structural_eq(va, vb, assumed))
        }
        _ => false,
    }
}

fn pair(a: &Value, b: &Value) -> (usize, usize) {
    (a.identity().unwrap_or(0), b.identity().unwrap_or(0))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        structural_eq(self, other, &mut HashSet::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Undefined => f.write_str("undefined"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Function(callable) => write!(f, "{callable:?}"),
            _ => match super::serialize(self) {
                Ok(encoded) => f.write_str(&encoded),
                Err(_) => write!(f, "<{}>", self.type_name()),
            },
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::Number(n as f64)
            }
        })*
    };
}

number_from!(i32, i64, u16, u32, u64, usize);

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<Callable> for Value {
    fn from(callable: Callable) -> Self {
        Value::Function(callable)
    }
}

impl From<ErrorValue> for Value {
    fn from(error: ErrorValue) -> Self {
        Value::error(error)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(at: DateTime<Utc>) -> Self {
        Value::date(at)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
