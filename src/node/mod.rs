//! Node Module
//!
//! A node is one HTTP endpoint plus the state it owns.
//!
//! ## Core Mechanisms
//! - **Context**: per-node routes, groups, stores and RPC table in a [`NodeContext`]
//! - **Dispatch**: `PUT /{gid}/{service}/{method}` resolved through the routes registry
//! - **Built-ins**: status, groups, routes, comm, mem and store under `local`, and their
//!   distributed counterparts under every group the node learns about
//! - **Lifecycle**: `start` binds and serves, `status.stop` drains in-flight requests and exits

mod context;
pub mod server;
pub(crate) mod services;

pub use context::NodeContext;
pub use server::{DispatchError, NodeHandle, parse_path, router, start};

#[cfg(test)]
mod tests;
