use crate::utils::hash::{ChecksumOptions, HashAlgorithm, HashEncoding, checksum};
use chrono::Utc;
use std::path::Path;

/// Number of trailing digest characters kept from the original name's hash.
pub const NAME_HASH_LENGTH: usize = 5;

/// Options for [`hash_filename`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameHashOptions {
    /// Append the last three digits of the current epoch milliseconds after
    /// the name hash. Breaks reproducibility across calls.
    pub add_random_string: bool,
    pub separator: String,
    /// Keep the whole body digest instead of its 8 leading characters.
    pub use_full_hash: bool,
    pub algorithm: HashAlgorithm,
    pub encoding: HashEncoding,
}

impl Default for FilenameHashOptions {
    fn default() -> Self {
        Self {
            add_random_string: true,
            separator: ".".to_string(),
            use_full_hash: true,
            algorithm: HashAlgorithm::Md5,
            encoding: HashEncoding::Hex,
        }
    }
}

/// Coarse time nonce: last three digits of the epoch milliseconds, zero padded.
pub fn time_nonce() -> String {
    format!("{:03}", Utc::now().timestamp_millis().rem_euclid(1000))
}

/// Builds `{nameHash}{nonce}{separator}{bodyHash}` from in-memory bytes.
pub fn hash_filename_bytes(
    body: &[u8],
    original_name: &str,
    options: &FilenameHashOptions,
    nonce: &str,
) -> String {
    let body_hash = checksum(
        body,
        &ChecksumOptions {
            algorithm: options.algorithm,
            encoding: options.encoding,
            use_full_hash: options.use_full_hash,
            ..Default::default()
        },
    );
    let name_hash = checksum(
        original_name,
        &ChecksumOptions {
            algorithm: options.algorithm,
            encoding: options.encoding,
            length_from_end: Some(NAME_HASH_LENGTH),
            ..Default::default()
        },
    );
    let nonce = if options.add_random_string { nonce } else { "" };

    format!("{}{}{}{}", name_hash, nonce, options.separator, body_hash)
}

/// Reads the file at `path` and derives its hashed filename stem.
pub async fn hash_filename(
    path: &Path,
    original_name: &str,
    options: &FilenameHashOptions,
) -> std::io::Result<String> {
    let body = tokio::fs::read(path).await?;
    Ok(hash_filename_bytes(
        &body,
        original_name,
        options,
        &time_nonce(),
    ))
}
