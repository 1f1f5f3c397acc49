//! # Codec
//!
//! Self-describing serialization of arbitrary value graphs.
//!
//! ## Core Concepts
//! - **Value**: dynamically typed data; composites are shared handles
//! - **Identity**: composites are tracked by pointer, never by content
//! - **References**: repeated composites encode as `{"type":"reference","id":N}`
//! - **Natives**: functions from a fixed table travel by module and path
//! - **Stubs**: exported functions travel as `(node, method)` and run remotely

mod decode;
mod encode;
pub mod natives;
mod repr;
pub mod value;

pub use decode::deserialize;
pub use encode::serialize;
pub use value::{Callable, ErrorValue, Value};

use thiserror::Error;

/// Deepest nesting of objects, arrays and errors either side will handle.
/// Each level costs two levels of JSON, which keeps the wire text well inside
/// the parser's recursion limit.
pub const MAX_DEPTH: usize = 48;

pub(crate) fn too_deep() -> CodecError {
    CodecError::UnsupportedType(format!("value nests deeper than {MAX_DEPTH} levels"))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed serialized input: {0}")]
    Format(String),
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    #[error("reference to unknown id {0}")]
    UnresolvedReference(u64),
}
