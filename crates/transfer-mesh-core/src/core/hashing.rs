// crates/transfer-mesh-core/src/core/hashing.rs
// ============================================================================
// Module: Transfer Mesh Content Hashing
// Description: SHA-256 content digests for catalog entries and transfers.
// Purpose: Provide one-shot and incremental hashing over file bytes.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! Catalog entries record a lowercase hex SHA-256 digest of the physical
//! content. Transfers hash bytes incrementally while streaming chunks so
//! verification never needs the whole file in memory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;

use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Length of a hex-encoded SHA-256 digest.
pub const SHA256_HEX_LEN: usize = 64;

/// Read buffer size used when hashing files from disk.
const HASH_READ_BUFFER_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: Incremental Hasher
// ============================================================================

/// Incremental SHA-256 hasher that also counts consumed bytes.
#[derive(Clone, Default)]
pub struct ContentHasher {
    /// Underlying SHA-256 state.
    hasher: Sha256,
    /// Total bytes fed into the hasher.
    bytes: u64,
}

impl ContentHasher {
    /// Creates an empty hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of content into the digest.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes = self.bytes.saturating_add(chunk.len() as u64);
    }

    /// Returns the number of bytes hashed so far.
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Consumes the hasher and returns the lowercase hex digest.
    #[must_use]
    pub fn finalize(self) -> String {
        hex_encode(&self.hasher.finalize())
    }
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Hashes raw bytes and returns the lowercase hex digest.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = ContentHasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Hashes everything readable from `reader`, returning `(digest, bytes)`.
///
/// # Errors
///
/// Returns the underlying I/O error when reading fails.
pub fn hash_reader<R: Read>(mut reader: R) -> std::io::Result<(String, u64)> {
    let mut hasher = ContentHasher::new();
    let mut buffer = vec![0_u8; HASH_READ_BUFFER_BYTES];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    let bytes = hasher.bytes();
    Ok((hasher.finalize(), bytes))
}

/// Returns true when `value` looks like a lowercase hex SHA-256 digest.
#[must_use]
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == SHA256_HEX_LEN
        && value.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
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
    #![allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]

    use super::ContentHasher;
    use super::hash_bytes;
    use super::hash_reader;
    use super::is_sha256_hex;

    #[test]
    fn empty_input_matches_known_digest() {
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn incremental_hash_matches_one_shot() {
        let mut hasher = ContentHasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.bytes(), 11);
        assert_eq!(hasher.finalize(), hash_bytes(b"hello world"));
    }

    #[test]
    fn reader_hash_counts_bytes() {
        let data = vec![7_u8; 200_000];
        let (digest, bytes) = hash_reader(data.as_slice()).expect("hash reader");
        assert_eq!(bytes, 200_000);
        assert_eq!(digest, hash_bytes(&data));
        assert!(is_sha256_hex(&digest));
    }

    #[test]
    fn hex_check_rejects_uppercase_and_short() {
        assert!(!is_sha256_hex("ABC"));
        assert!(!is_sha256_hex(&"A".repeat(64)));
    }
}
