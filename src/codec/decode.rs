use super::natives;
use super::repr::Repr;
use super::value::{Callable, ErrorValue, Value, write};
use super::{CodecError, MAX_DEPTH, too_deep};

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Rebuilds a value graph from serialized text.
///
/// Composites are registered in an id arena before their children are decoded,
/// so a `reference` nested inside the composite it names resolves to the
/// composite itself.
pub fn deserialize(input: &str) -> Result<Value, CodecError> {
    let repr: Repr = serde_json::from_str(input).map_err(|e| CodecError::Format(e.to_string()))?;
    Decoder::default().decode(repr)
}

fn parse_number(text: &str) -> Result<f64, CodecError> {
    match text {
        "NaN" => Ok(f64::NAN),
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        other => other
            .parse::<f64>()
            .map_err(|_| CodecError::Format(format!("invalid number literal: {other}"))),
    }
}

#[derive(Default)]
struct Decoder {
    arena: HashMap<u64, Value>,
    depth: usize,
}

impl Decoder {
    fn decode(&mut self, repr: Repr) -> Result<Value, CodecError> {
        let nests = matches!(
            repr,
            Repr::Object { .. } | Repr::Array { .. } | Repr::Error { .. }
        );
        if !nests {
            return self.decode_repr(repr);
        }
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(too_deep());
        }
        let value = self.decode_repr(repr)?;
        self.depth -= 1;
        Ok(value)
    }

    fn decode_repr(&mut self, repr: Repr) -> Result<Value, CodecError> {
        match repr {
            Repr::Null => Ok(Value::Null),
            Repr::Undefined => Ok(Value::Undefined),
            Repr::Boolean { value } => match value.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                other => Err(CodecError::Format(format!(
                    "invalid boolean literal: {other}"
                ))),
            },
            Repr::Number { value } => parse_number(&value).map(Value::Number),
            Repr::String { value } => Ok(Value::String(value)),
            Repr::Object { id, value } => {
                let map = Arc::new(RwLock::new(BTreeMap::new()));
                self.arena.insert(id, Value::Object(map.clone()));
                for (key, item) in value {
                    let item = self.decode(item)?;
                    write(&map).insert(key, item);
                }
                Ok(Value::Object(map))
            }
            Repr::Array { id, value } => {
                let items = Arc::new(RwLock::new(Vec::with_capacity(value.len())));
                self.arena.insert(id, Value::Array(items.clone()));
                for item in value {
                    let item = self.decode(item)?;
                    write(&items).push(item);
                }
                Ok(Value::Array(items))
            }
            Repr::Date { id, value } => {
                let at = DateTime::parse_from_rfc3339(&value)
                    .map_err(|e| CodecError::Format(format!("invalid date {value}: {e}")))?
                    .with_timezone(&Utc);
                let date = Value::date(at);
                self.arena.insert(id, date.clone());
                Ok(date)
            }
            Repr::Error {
                id,
                name,
                message,
                fields,
            } => {
                let error = Arc::new(RwLock::new(ErrorValue::new(name, message)));
                self.arena.insert(id, Value::Error(error.clone()));
                for (key, item) in fields {
                    let item = self.decode(item)?;
                    write(&error).fields.insert(key, item);
                }
                Ok(Value::Error(error))
            }
            Repr::Reference { id } => self
                .arena
                .get(&id)
                .cloned()
                .ok_or(CodecError::UnresolvedReference(id)),
            Repr::Native { module, path } => {
                if natives::resolve(&module, &path).is_none() {
                    return Err(CodecError::UnsupportedType(format!(
                        "native function {}.{} is not registered",
                        module,
                        path.join(".")
                    )));
                }
                Ok(Value::Function(Callable::Native { module, path }))
            }
            Repr::Stub { node, method } => Ok(Value::Function(Callable::Stub { node, method })),
            Repr::Function { .. } => Err(CodecError::UnsupportedType(
                "function source cannot be reconstructed".to_string(),
            )),
        }
    }
}
