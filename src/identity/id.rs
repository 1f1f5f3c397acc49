use crate::codec::{self, CodecError, Value};
use crate::membership::types::Node;

use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt::Write;

/// Length of a short node id.
pub const SID_LEN: usize = 5;

pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let digest = Sha256::digest(data.as_ref());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Content id of an arbitrary value: the digest of its serialized form.
pub fn content_id(value: &Value) -> Result<String, CodecError> {
    Ok(sha256_hex(codec::serialize(value)?))
}

/// Id of a string key, hashed over its JSON literal.
pub fn kid(key: &str) -> String {
    sha256_hex(serde_json::Value::from(key).to_string())
}

pub fn nid(node: &Node) -> String {
    let descriptor = serde_json::json!({ "ip": node.ip, "port": node.port });
    sha256_hex(descriptor.to_string())
}

pub fn sid(node: &Node) -> String {
    let mut nid = nid(node);
    nid.truncate(SID_LEN);
    nid
}

/// Leading hex digits of an id, without leading zeros.
fn significant_digits(id: &str) -> &str {
    let end = id
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(id.len());
    id[..end].trim_start_matches('0')
}

/// Compares two hex ids by numeric value, at full precision.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    let (a, b) = (significant_digits(a), significant_digits(b));
    a.len().cmp(&b.len()).then_with(|| {
        a.bytes()
            .map(|c| c.to_ascii_lowercase())
            .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
    })
}

/// Numeric value of a hex id modulo `n`. Returns 0 when `n` is 0.
pub fn id_mod(id: &str, n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let n = n as u128;
    significant_digits(id)
        .chars()
        .filter_map(|c| c.to_digit(16))
        .fold(0u128, |acc, digit| (acc * 16 + digit as u128) % n) as usize
}
