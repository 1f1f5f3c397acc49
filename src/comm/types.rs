use crate::codec::{CodecError, Value};
use crate::error::{Error, ErrorKind};
use crate::membership::types::{LOCAL, Node};

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request failed with status code {status}{}", remote_detail(.error))]
    Remote { status: u16, error: Option<Value> },
    #[error("malformed response: {0}")]
    ResponseFormat(String),
}

fn remote_detail(error: &Option<Value>) -> String {
    match error.as_ref().and_then(Value::as_error) {
        Some(error) => format!(": {}: {}", error.name, error.message),
        None => String::new(),
    }
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::InvalidTarget(_) => ErrorKind::InvalidTarget,
            TransportError::Codec(CodecError::Format(_)) => ErrorKind::FormatError,
            TransportError::Codec(CodecError::UnsupportedType(_)) => ErrorKind::UnsupportedType,
            TransportError::Codec(CodecError::UnresolvedReference(_)) => {
                ErrorKind::UnresolvedReference
            }
            TransportError::Connection(_) => ErrorKind::ConnectionError,
            TransportError::Remote { .. } => ErrorKind::RemoteError,
            TransportError::ResponseFormat(_) => ErrorKind::ResponseFormatError,
        }
    }
}

/// Destination of a single RPC. Fields are optional so that a target built
/// from untrusted data can be rejected before any I/O happens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteTarget {
    pub node: Option<Node>,
    pub service: Option<String>,
    pub method: Option<String>,
    pub gid: Option<String>,
}

impl RemoteTarget {
    pub fn new(node: Node, service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            node: Some(node),
            service: Some(service.into()),
            method: Some(method.into()),
            gid: None,
        }
    }

    pub fn with_gid(mut self, gid: impl Into<String>) -> Self {
        self.gid = Some(gid.into());
        self
    }

    /// Checks the target and returns the node plus the `/{gid}/{service}/{method}` path.
    pub fn resolve(&self) -> Result<(&Node, String), TransportError> {
        let node = self
            .node
            .as_ref()
            .ok_or_else(|| TransportError::InvalidTarget("missing node".to_string()))?;
        let service = segment(self.service.as_deref(), "service")?;
        let method = segment(self.method.as_deref(), "method")?;
        let gid = match self.gid.as_deref() {
            None => LOCAL,
            Some(gid) => segment(Some(gid), "gid")?,
        };
        Ok((node, format!("/{gid}/{service}/{method}")))
    }

    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(|v| v.as_str().map(str::to_string));
        Self {
            node: value.get("node").and_then(|node| Node::from_value(&node)),
            service: text("service"),
            method: text("method"),
            gid: text("gid"),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut entries = Vec::new();
        if let Some(node) = &self.node {
            entries.push(("node".to_string(), node.to_value()));
        }
        for (key, field) in [
            ("service", &self.service),
            ("method", &self.method),
            ("gid", &self.gid),
        ] {
            if let Some(field) = field {
                entries.push((key.to_string(), Value::from(field.as_str())));
            }
        }
        Value::object(entries)
    }
}

fn segment<'a>(part: Option<&'a str>, what: &str) -> Result<&'a str, TransportError> {
    match part {
        Some(part) if !part.is_empty() && !part.contains('/') => Ok(part),
        Some(part) => Err(TransportError::InvalidTarget(format!(
            "{what} {part:?} is not a path segment"
        ))),
        None => Err(TransportError::InvalidTarget(format!("missing {what}"))),
    }
}

/// The `{error, value}` pair every handler replies with.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub error: Value,
    pub value: Value,
}

impl Envelope {
    pub fn ok(value: impl Into<Value>) -> Self {
        Self {
            error: Value::Null,
            value: value.into(),
        }
    }

    pub fn failed(error: Value) -> Self {
        Self {
            error,
            value: Value::Undefined,
        }
    }

    pub fn pair(error: Value, value: Value) -> Self {
        Self { error, value }
    }

    pub fn from_error(error: &Error) -> Self {
        Self::failed(error.to_value())
    }

    pub fn from_result(result: Result<Value, Error>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(error) => Self::from_error(&error),
        }
    }

    /// A reply is a failure when its error slot holds an error value. Other
    /// non-null errors, such as a map of per-node errors, ride along with a
    /// successful reply.
    pub fn is_failure(&self) -> bool {
        matches!(self.error, Value::Error(_))
    }

    pub fn to_value(&self) -> Value {
        Value::object([
            ("error".to_string(), self.error.clone()),
            ("value".to_string(), self.value.clone()),
        ])
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        value.entries()?;
        Some(Self {
            error: value.get("error").unwrap_or(Value::Undefined),
            value: value.get("value").unwrap_or(Value::Undefined),
        })
    }

    /// Collapses the pair into a `Result`. An empty error mapping counts as no
    /// error.
    pub fn into_result(self) -> Result<Value, Error> {
        let no_error = self.error.is_nullish()
            || self
                .error
                .entries()
                .is_some_and(|entries| entries.is_empty());
        if no_error {
            Ok(self.value)
        } else {
            Err(Error::from_value(&self.error))
        }
    }
}
