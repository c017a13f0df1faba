use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashError {
    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Unsupported digest encoding: {0}")]
    UnsupportedEncoding(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Md5 => Md5::digest(data).to_vec(),
            HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            other => Err(HashError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashEncoding {
    #[default]
    Hex,
    Base64,
}

impl HashEncoding {
    fn encode(self, digest: &[u8]) -> String {
        match self {
            HashEncoding::Hex => hex::encode(digest),
            HashEncoding::Base64 => STANDARD.encode(digest),
        }
    }
}

impl FromStr for HashEncoding {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hex" => Ok(HashEncoding::Hex),
            "base64" => Ok(HashEncoding::Base64),
            other => Err(HashError::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// Options controlling how a digest is computed and shortened.
///
/// `length_from_end` wins over `length` when both are set. A zero length is
/// treated as unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumOptions {
    pub algorithm: HashAlgorithm,
    pub encoding: HashEncoding,
    pub length: Option<usize>,
    pub length_from_end: Option<usize>,
    pub use_full_hash: bool,
}

impl Default for ChecksumOptions {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Md5,
            encoding: HashEncoding::Hex,
            length: Some(8),
            length_from_end: None,
            use_full_hash: false,
        }
    }
}

/// Computes the digest of `input` and truncates it according to `options`.
pub fn checksum(input: impl AsRef<[u8]>, options: &ChecksumOptions) -> String {
    let full_hash = options
        .encoding
        .encode(&options.algorithm.digest(input.as_ref()));

    let short_hash = match (
        options.length_from_end.filter(|n| *n > 0),
        options.length.filter(|n| *n > 0),
    ) {
        (Some(n), _) => &full_hash[full_hash.len().saturating_sub(n)..],
        (None, Some(n)) => &full_hash[..n.min(full_hash.len())],
        (None, None) => "",
    };

    if options.use_full_hash || short_hash.is_empty() {
        full_hash
    } else {
        short_hash.to_string()
    }
}
