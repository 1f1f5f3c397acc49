//! Distributed Computing Substrate Library
//!
//! This library crate defines the core modules that make up a node.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//!
//! - **`codec`**: Lossless serialization of the value model, including cycles,
//!   shared references, dates, errors and function references.
//! - **`identity`**: SHA-256 content, node and key ids, plus the placement strategies
//!   that map a key id onto one node id.
//! - **`comm`**: Point-to-point RPC over HTTP and group fan-out with per-member aggregation.
//! - **`routes`**: The per-node service registry, RPC stubs and service descriptors.
//! - **`membership`**: Named groups of nodes and the distributed services bound to each group.
//! - **`storage`**: In-memory and on-disk key-value stores, local and group-wide.
//! - **`status`**: Node self-description and lifecycle.
//! - **`node`**: The HTTP dispatcher, the per-node context and the built-in service bindings.
//! - **`config`** and **`error`**: Node settings and the shared error taxonomy.

pub mod codec;
pub mod comm;
pub mod config;
pub mod error;
pub mod identity;
pub mod membership;
pub mod node;
pub mod routes;
pub mod status;
pub mod storage;
