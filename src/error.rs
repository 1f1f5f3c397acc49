//! Crate-wide error type.
//!
//! Each subsystem has its own `thiserror` enum; [`Error`] wraps them and maps
//! every failure onto a stable [`ErrorKind`] name. That name is what travels in
//! the `name` field of an error value on the wire, so a node can recognise a
//! remote `KeyNotFound` just as it recognises a local one.

use crate::codec::{CodecError, ErrorValue, Value};
use crate::comm::TransportError;
use crate::membership::GroupsError;
use crate::routes::RoutesError;
use crate::status::StatusError;
use crate::storage::KvError;

pub use crate::node::DispatchError;

use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FormatError,
    UnsupportedType,
    UnresolvedReference,
    InvalidTarget,
    ConnectionError,
    RemoteError,
    ResponseFormatError,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    GroupNotFound,
    ServiceNotFound,
    KeyNotFound,
    StorageError,
    HandlerError,
}

impl ErrorKind {
    const ALL: [ErrorKind; 15] = [
        ErrorKind::FormatError,
        ErrorKind::UnsupportedType,
        ErrorKind::UnresolvedReference,
        ErrorKind::InvalidTarget,
        ErrorKind::ConnectionError,
        ErrorKind::RemoteError,
        ErrorKind::ResponseFormatError,
        ErrorKind::BadRequest,
        ErrorKind::NotFound,
        ErrorKind::MethodNotAllowed,
        ErrorKind::GroupNotFound,
        ErrorKind::ServiceNotFound,
        ErrorKind::KeyNotFound,
        ErrorKind::StorageError,
        ErrorKind::HandlerError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::FormatError => "FormatError",
            ErrorKind::UnsupportedType => "UnsupportedType",
            ErrorKind::UnresolvedReference => "UnresolvedReference",
            ErrorKind::InvalidTarget => "InvalidTarget",
            ErrorKind::ConnectionError => "ConnectionError",
            ErrorKind::RemoteError => "RemoteError",
            ErrorKind::ResponseFormatError => "ResponseFormatError",
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::MethodNotAllowed => "MethodNotAllowed",
            ErrorKind::GroupNotFound => "GroupNotFound",
            ErrorKind::ServiceNotFound => "ServiceNotFound",
            ErrorKind::KeyNotFound => "KeyNotFound",
            ErrorKind::StorageError => "StorageError",
            ErrorKind::HandlerError => "HandlerError",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Transport(TransportError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Routes(#[from] RoutesError),
    #[error(transparent)]
    Groups(#[from] GroupsError),
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    Status(#[from] StatusError),
    /// An error value received from another node.
    #[error("{message}")]
    Remote {
        kind: ErrorKind,
        message: String,
        status: Option<u16>,
    },
    #[error("{0}")]
    Handler(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Codec(CodecError::Format(_)) => ErrorKind::FormatError,
            Error::Codec(CodecError::UnsupportedType(_)) => ErrorKind::UnsupportedType,
            Error::Codec(CodecError::UnresolvedReference(_)) => ErrorKind::UnresolvedReference,
            Error::Transport(err) => err.kind(),
            Error::Dispatch(err) => err.kind(),
            Error::Routes(RoutesError::GroupNotFound(_)) => ErrorKind::GroupNotFound,
            Error::Routes(RoutesError::ServiceNotFound(_)) => ErrorKind::ServiceNotFound,
            Error::Groups(err) => err.kind(),
            Error::Kv(err) => err.kind(),
            Error::Status(StatusError::UnknownKey(_)) => ErrorKind::KeyNotFound,
            Error::Remote { kind, .. } => *kind,
            Error::Handler(_) => ErrorKind::HandlerError,
        }
    }

    pub fn to_error_value(&self) -> ErrorValue {
        let error = ErrorValue::new(self.kind().as_str(), self.to_string());
        match self {
            Error::Remote {
                status: Some(status),
                ..
            } => error.with_field("status", *status),
            Error::Transport(TransportError::Remote { status, .. }) => {
                error.with_field("status", *status)
            }
            _ => error,
        }
    }

    pub fn to_value(&self) -> Value {
        Value::error(self.to_error_value())
    }

    /// Rebuilds an error from its wire form. Names outside the taxonomy are
    /// kept as `RemoteError`.
    pub fn from_error_value(error: &ErrorValue, status: Option<u16>) -> Self {
        Error::Remote {
            kind: ErrorKind::from_name(&error.name).unwrap_or(ErrorKind::RemoteError),
            message: error.message.clone(),
            status,
        }
    }

    /// Interprets any non-null value found in an error slot.
    pub fn from_value(value: &Value) -> Self {
        match value.as_error() {
            Some(error) => Error::from_error_value(&error, None),
            None => Error::Remote {
                kind: ErrorKind::RemoteError,
                message: format!("{value:?}"),
                status: None,
            },
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        if let TransportError::Remote {
            status,
            error: Some(value),
        } = &err
            && let Some(remote) = value.as_error()
        {
            return Error::from_error_value(&remote, Some(*status));
        }
        Error::Transport(err)
    }
}
