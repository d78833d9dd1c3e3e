// frostgate-core/src/hashing.rs
// ============================================================================
// Module: FrostGate Canonical Hashing
// Description: RFC 8785 JSON canonicalization and content hashing utilities.
// Purpose: Provide deterministic hashes for event ids and audit chain links.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! FrostGate hashes all canonical JSON using RFC 8785 (JCS) to guarantee
//! stable, replayable digests: identical request bodies always produce the
//! same `event_id`, and audit chain links are reproducible from the stored
//! row alone.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Supported hash algorithms for FrostGate artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-256 hashing (the only algorithm used in MVP).
    Sha256,
}

/// Default hash algorithm for FrostGate.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

impl HashAlgorithm {
    /// Returns the canonical lowercase label used in stored rows.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

// ============================================================================
// SECTION: Hash Digest
// ============================================================================

/// Deterministic content hash representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashDigest {
    /// Hash algorithm identifier.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest bytes.
    pub value: String,
}

impl HashDigest {
    /// Creates a new digest from raw bytes.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            value: hex_encode(bytes),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing canonical hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785:
/// sorted object keys, minimal separators, UTF-8, no NaN/Inf.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes canonical JSON using the provided algorithm.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn hash_canonical_json<T: Serialize + ?Sized>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Hashes raw bytes using the provided algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            let digest = hasher.finalize();
            HashDigest::new(HashAlgorithm::Sha256, &digest)
        }
    }
}

/// Computes a sha256 hash chain link: `sha256(prev_hash_hex || canonical(value))`.
///
/// `prev_hash` is the empty string for the first record in a chain.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn chain_hash<T: Serialize + ?Sized>(
    prev_hash: &str,
    value: &T,
) -> Result<HashDigest, HashError> {
    let mut bytes = Vec::with_capacity(prev_hash.len() + 256);
    bytes.extend_from_slice(prev_hash.as_bytes());
    bytes.extend_from_slice(&canonical_json_bytes(value)?);
    Ok(hash_bytes(HashAlgorithm::Sha256, &bytes))
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys_and_minimizes_separators() {
        let value = json!({"b": 1, "a": 2});
        let bytes = canonical_json_bytes(&value).expect("canonicalization succeeds");
        assert_eq!(String::from_utf8(bytes).expect("utf8"), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn hash_is_deterministic() {
        let value = json!({"x": 1});
        let first = hash_canonical_json(HashAlgorithm::Sha256, &value).expect("hash");
        let second = hash_canonical_json(HashAlgorithm::Sha256, &value).expect("hash");
        assert_eq!(first.value, second.value);
        assert_eq!(first.value.len(), 64);
    }

    #[test]
    fn chain_hash_links_to_predecessor() {
        let value = json!({"k": "v"});
        let first = chain_hash("", &value).expect("chain hash");
        let second = chain_hash(&first.value, &value).expect("chain hash");
        assert_ne!(first.value, second.value);
    }
}
