//! Membership Module
//!
//! Named groups of nodes, kept per node and propagated by fan-out.
//!
//! ## Core Mechanisms
//! - **Group table**: `name -> {SID -> Node}`; every group is merged into the reserved `all`
//! - **Bindings**: a known group gets distributed status, comm, groups, routes, mem and store services
//! - **Propagation**: distributed put/del/add/rem replay the same change on every member
//! - **Convergence**: last write wins on each receiving node; there is no epoch or vector clock

pub mod bindings;
pub mod distributed;
pub mod groups;
pub mod service;
pub mod types;

pub use bindings::GroupServices;
pub use groups::{GroupTable, GroupsError};
pub use service::LocalGroups;
