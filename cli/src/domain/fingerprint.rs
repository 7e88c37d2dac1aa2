//! Content fingerprinting — the sole change-detection primitive.
//!
//! The reconciler never compares payload bytes directly; every block
//! value, tool source, and folder file is reduced to a SHA-256 digest
//! and digests are compared instead.

use sha2::{Digest, Sha256};

/// Leading hex characters used as the content-address token in versioned
/// block labels.
pub const SHORT_LEN: usize = 8;

/// SHA-256 of the payload as 64 lowercase hex characters.
#[must_use]
pub fn fingerprint(payload: impl AsRef<[u8]>) -> String {
    hex_encode(&Sha256::digest(payload))
}

/// The leading [`SHORT_LEN`] characters of [`fingerprint`].
#[must_use]
pub fn short_fingerprint(payload: impl AsRef<[u8]>) -> String {
    let mut digest = fingerprint(payload);
    digest.truncate(SHORT_LEN);
    digest
}

/// Fingerprint of an agent's mutable configuration surface: the system
/// prompt plus its (tool name, source hash) pairs.
///
/// Pairs are sorted and serialized to canonical JSON first, so the digest
/// is stable across tool declaration order.
#[must_use]
pub fn agent_config_fingerprint(
    system_prompt: &str,
    tools: &[(String, Option<String>)],
) -> String {
    let mut pairs: Vec<(&str, Option<&str>)> = tools
        .iter()
        .map(|(name, hash)| (name.as_str(), hash.as_deref()))
        .collect();
    pairs.sort_unstable();
    let canonical = serde_json::json!({
        "system": system_prompt,
        "tools": pairs,
    });
    fingerprint(canonical.to_string())
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(HEX[(b >> 4) as usize]));
        out.push(char::from(HEX[(b & 0xf) as usize]));
    }
    out
}
