//! # Communication
//!
//! RPC between nodes and fan-out across a group.
//!
//! ## Core Concepts
//! - **Transport**: one `PUT /{gid}/{service}/{method}` per call, body = serialized argument list
//! - **Envelope**: every reply is an `{error, value}` pair
//! - **Fan-out**: `GroupComm` calls every member concurrently and waits for all of them
//! - **Aggregate**: per-SID errors and results; a member never appears in both

pub mod fanout;
pub mod transport;
pub mod types;

pub use fanout::{Aggregate, FanoutTarget, GroupComm};
pub use transport::Transport;
pub use types::{Envelope, RemoteTarget, TransportError};
