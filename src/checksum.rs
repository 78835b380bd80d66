// src/checksum.rs

//! Content checksums attached to artifacts, dependencies and modules
//!
//! A checksum carries three digests:
//! - **SHA-1** and **MD5**: legacy digests, kept because artifact registries
//!   still look artifacts up by them
//! - **SHA-256**: the modern digest
//!
//! All three are lowercase hex strings. A field that was never computed is the
//! empty string and is omitted from the serialized form.

use crate::error::Result;
use crate::matching::field_matches;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Triple of content digests
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Checksum {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sha1: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub md5: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sha256: String,
}

impl Checksum {
    /// Create a checksum from already known digests
    pub fn new(
        sha1: impl Into<String>,
        md5: impl Into<String>,
        sha256: impl Into<String>,
    ) -> Self {
        Self {
            sha1: sha1.into(),
            md5: md5.into(),
            sha256: sha256.into(),
        }
    }

    /// True when none of the three digests is set
    pub fn is_empty(&self) -> bool {
        self.sha1.is_empty() && self.md5.is_empty() && self.sha256.is_empty()
    }

    /// Compare against an expected checksum whose fields are patterns.
    ///
    /// An empty expected field accepts any actual digest.
    pub fn matches(&self, expected: &Checksum) -> Result<bool> {
        Ok(field_matches(&expected.sha1, &self.sha1)?
            && field_matches(&expected.md5, &self.md5)?
            && field_matches(&expected.sha256, &self.sha256)?)
    }

    /// Compute all three digests in a single pass over a reader
    pub fn calculate<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut sha1 = Sha1::new();
        let mut md5 = Md5::new();
        let mut sha256 = Sha256::new();
        let mut buffer = [0u8; 8192];

        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            sha1.update(&buffer[..n]);
            md5.update(&buffer[..n]);
            sha256.update(&buffer[..n]);
        }

        Ok(Self {
            sha1: hex::encode(sha1.finalize()),
            md5: hex::encode(md5.finalize()),
            sha256: hex::encode(sha256.finalize()),
        })
    }

    /// Compute the checksum of a byte slice
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut cursor = data;
        // Reading from a slice cannot fail
        Self::calculate(&mut cursor).unwrap_or_default()
    }

    /// Compute the checksum of a file, streaming its content
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        Ok(Self::calculate(&mut file)?)
    }
}
