//! Key-Value Storage Module
//!
//! Two node-local stores and their group-wide front end.
//!
//! ## Core Concepts
//! - **MemStore**: in-memory map per gid, lost on restart
//! - **DiskStore**: one file per key under `<root>/<gid>/`, values kept in codec form
//! - **Placement**: `DistributedKv` hashes the key and sends the call to the one member that owns it
//! - **Reconfiguration**: swapping the strategy affects later calls only; nothing is migrated

pub mod disk;
pub mod distributed;
pub mod memory;
pub mod protocol;

pub use disk::DiskStore;
pub use distributed::{DistributedKv, KvKind};
pub use memory::MemStore;
pub use protocol::{KeyConfig, KvError};

#[cfg(test)]
mod tests;
