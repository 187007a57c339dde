//! Hash algorithm resolution for sample lookups.

use std::fmt;

use crate::error::{Result, ScopeError};

/// Digest algorithms a sample can be looked up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Resolve the algorithm from the length of a hex digest.
    ///
    /// Only the length in characters is considered: 32, 40, 64 and 128 map
    /// to md5, sha1, sha256 and sha512. Anything else is an `InvalidHash`.
    pub fn from_hex_len(value: &str) -> Result<Self> {
        match value.chars().count() {
            32 => Ok(Self::Md5),
            40 => Ok(Self::Sha1),
            64 => Ok(Self::Sha256),
            128 => Ok(Self::Sha512),
            _ => Err(ScopeError::InvalidHash(value.to_string())),
        }
    }

    /// Name of the record field holding this digest.
    pub fn field(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}
