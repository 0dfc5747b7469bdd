//! Content-derived logical IDs
//!
//! Every synthesized resource is named by hashing its target properties, so
//! re-running synthesis against an unchanged snapshot reproduces the same
//! template keys. The function is pure: determinism of the payload is the
//! caller's obligation. In practice callers serialize a property object with
//! `serde_json::to_string`, whose default map is ordered by key, which makes
//! the serialization canonical without any work here.

use sha2::{Digest, Sha256};

/// CloudFormation logical IDs must start with a letter and stay alphanumeric;
/// a hex digest can start with a digit, hence the literal prefix.
const LOGICAL_ID_PREFIX: &str = "Res";

/// 160 bits of digest. Collision-safe at inventory scale and keeps template
/// diffs legible.
const DIGEST_HEX_LEN: usize = 40;

/// Derive a logical ID from a canonical property payload.
pub fn logical_id(canonical_payload: &str) -> String {
    let digest = Sha256::digest(canonical_payload.as_bytes());
    let hex = hex::encode(digest);
    format!("{}{}", LOGICAL_ID_PREFIX, &hex[..DIGEST_HEX_LEN])
}
