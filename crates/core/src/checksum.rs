//! Content checksums for migration scripts
//!
//! Checksums are SHA-256 over content bytes only, hex-encoded. SQL text is
//! line-ending normalized first so the same script hashes identically on
//! every platform. Filesystem metadata never enters the hash.

use sha2::{Digest, Sha256};

/// Hash raw bytes to a lowercase hex digest
pub fn checksum_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash SQL script text, optionally folding CRLF and lone CR to LF first
pub fn checksum_sql(content: &str, normalize: bool) -> String {
    if normalize {
        checksum_bytes(normalize_line_endings(content).as_bytes())
    } else {
        checksum_bytes(content.as_bytes())
    }
}

/// Fold `\r\n` and lone `\r` to `\n`
pub fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}
