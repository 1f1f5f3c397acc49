//! # Identity & Placement
//!
//! Content-derived identifiers and the key-to-node placement strategies.
//!
//! ## Core Concepts
//! - **NID**: SHA-256 (hex) of a node's `{ip, port}` JSON
//! - **SID**: first five hex digits of the NID, used as member map keys
//! - **KID**: SHA-256 of a key's JSON literal
//! - **Placement**: naive modulo, consistent ring or rendezvous scoring over NIDs
//!
//! Ids are compared and reduced as full 256-bit numbers, never through a
//! float, so placement stays stable for ids that differ only in low digits.

pub mod id;
pub mod placement;

pub use id::{compare_ids, content_id, id_mod, kid, nid, sha256_hex, sid};
pub use placement::Placement;
