// src/hash.rs

//! SHA-256 digests for archive integrity
//!
//! Registry lockfiles record the SHA-256 of every published archive as a
//! lowercase hex string. Both the downloaded original and the rebuilt
//! candidate are hashed with the same streaming digest and compared against
//! that value.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Buffer size for streaming file digests (64 KB)
const DIGEST_BUFFER_SIZE: usize = 64 * 1024;

/// A SHA-256 digest rendered as lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Hex length of a SHA-256 digest
    pub const HEX_LEN: usize = 64;

    /// Parse a hex digest, normalizing to lowercase
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() != Self::HEX_LEN || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(value.to_ascii_lowercase()))
    }

    /// Get the digest as a hex string
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against an expected hex string, ignoring case
    pub fn matches(&self, expected: &str) -> bool {
        self.0.eq_ignore_ascii_case(expected)
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the digest of a byte slice
pub fn sha256_bytes(data: &[u8]) -> Sha256Digest {
    Sha256Digest(format!("{:x}", Sha256::digest(data)))
}

/// Compute the digest of everything a reader yields
pub fn sha256_reader<R: Read>(reader: &mut R) -> io::Result<Sha256Digest> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; DIGEST_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(Sha256Digest(format!("{:x}", hasher.finalize())))
}

/// Compute the digest of a file, streaming its content
pub fn sha256_file(path: &Path) -> io::Result<Sha256Digest> {
    let mut file = File::open(path)?;
    sha256_reader(&mut file)
}
