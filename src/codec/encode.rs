use super::natives;
use super::repr::Repr;
use super::value::{Callable, Value, read};
use super::{CodecError, MAX_DEPTH, too_deep};

use chrono::SecondsFormat;
use std::collections::{BTreeMap, HashMap};

/// Serializes a value graph into its self-describing JSON text.
///
/// Every composite is emitted in full the first time it is reached and as a
/// `reference` to its id afterwards, so shared substructure and cycles
/// survive the trip. Values nested deeper than [`MAX_DEPTH`] are refused here
/// rather than by the receiver.
pub fn serialize(value: &Value) -> Result<String, CodecError> {
    let repr = Encoder::default().encode(value)?;
    serde_json::to_string(&repr).map_err(|e| CodecError::Format(e.to_string()))
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        n.to_string()
    }
}

#[derive(Default)]
struct Encoder {
    next_id: u64,
    seen: HashMap<usize, u64>,
    depth: usize,
}

impl Encoder {
    /// Assigns an id to a composite on first visit, or returns the id it
    /// already has.
    fn visit(&mut self, value: &Value) -> Result<u64, u64> {
        let identity = value.identity().unwrap_or_default();
        if let Some(id) = self.seen.get(&identity) {
            return Err(*id);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.seen.insert(identity, id);
        Ok(id)
    }

    fn encode(&mut self, value: &Value) -> Result<Repr, CodecError> {
        if value.identity().is_some()
            && let Err(id) = self.visit(value)
        {
            return Ok(Repr::Reference { id });
        }

        let nests = matches!(value, Value::Object(_) | Value::Array(_) | Value::Error(_));
        if nests {
            self.depth += 1;
            if self.depth > MAX_DEPTH {
                return Err(too_deep());
            }
        }

        let repr = match value {
            Value::Null => Repr::Null,
            Value::Undefined => Repr::Undefined,
            Value::Bool(b) => Repr::Boolean {
                value: b.to_string(),
            },
            Value::Number(n) => Repr::Number {
                value: format_number(*n),
            },
            Value::String(s) => Repr::String { value: s.clone() },
            Value::Object(map) => {
                let id = self.current_id(value);
                let entries: Vec<(String, Value)> = read(map)
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let mut encoded = BTreeMap::new();
                for (key, item) in entries {
                    encoded.insert(key, self.encode(&item)?);
                }
                Repr::Object { id, value: encoded }
            }
            Value::Array(items) => {
                let id = self.current_id(value);
                let items = read(items).clone();
                let mut encoded = Vec::with_capacity(items.len());
                for item in &items {
                    encoded.push(self.encode(item)?);
                }
                Repr::Array { id, value: encoded }
            }
            Value::Date(at) => Repr::Date {
                id: self.current_id(value),
                value: at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            },
            Value::Error(error) => {
                let id = self.current_id(value);
                let error = read(error).clone();
                let mut fields = BTreeMap::new();
                for (key, item) in &error.fields {
                    fields.insert(key.clone(), self.encode(item)?);
                }
                Repr::Error {
                    id,
                    name: error.name,
                    message: error.message,
                    fields,
                }
            }
            Value::Function(callable) => encode_callable(callable)?,
        };
        if nests {
            self.depth -= 1;
        }
        Ok(repr)
    }

    fn current_id(&self, value: &Value) -> u64 {
        value
            .identity()
            .and_then(|identity| self.seen.get(&identity).copied())
            .unwrap_or_default()
    }
}

fn encode_callable(callable: &Callable) -> Result<Repr, CodecError> {
    match callable {
        Callable::Native { module, path } => {
            if natives::resolve(module, path).is_none() {
                return Err(CodecError::UnsupportedType(format!(
                    "native function {}.{} is not registered",
                    module,
                    path.join(".")
                )));
            }
            Ok(Repr::Native {
                module: module.clone(),
                path: path.clone(),
            })
        }
        Callable::Stub { node, method } => Ok(Repr::Stub {
            node: node.clone(),
            method: method.clone(),
        }),
    }
}
