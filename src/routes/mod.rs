//! # Routes
//!
//! The per-node service registry behind the dispatcher.
//!
//! ## Core Concepts
//! - **ServiceObject**: named bundle of type-erased async methods
//! - **ServiceKey**: `(service, gid)`; a bare name means gid `local`
//! - **RPC table**: exported functions live under the `rpc` service and travel as stubs
//! - **Descriptors**: `{method: callable}` mappings let one node install a service on others

pub mod distributed;
pub mod registry;
pub mod rpc;
pub mod service;

pub use distributed::DistributedRoutes;
pub use registry::{Routes, RoutesError, ServiceKey};
pub use rpc::{RPC_SERVICE, RpcTable};
pub use service::{MethodFn, ServiceObject};
