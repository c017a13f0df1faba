use bytes::Bytes;

use crate::api::error::AppError;

/// Category accepted by the image endpoint.
pub const DEFAULT_EXPECTED_CATEGORY: &str = "image";

/// Outcome of sniffing a buffer.
#[derive(Debug, Clone)]
pub struct SniffedFile {
    pub buffer: Bytes,
    pub ext: String,
    pub mime_type: String,
}

/// Sniffs the real type of `buffer` and checks its top-level category.
///
/// The client's declared content type is never consulted. Content that cannot
/// be identified is rejected the same way as a mismatch.
pub fn validate_file_type(buffer: Bytes, expected: &str) -> Result<SniffedFile, AppError> {
    let reject = || AppError::UnsupportedMediaType {
        expected: expected.to_string(),
    };

    let Some(kind) = infer::get(&buffer) else {
        tracing::debug!("Could not identify uploaded content ({} bytes)", buffer.len());
        return Err(reject());
    };

    let mime: mime::Mime = kind.mime_type().parse().map_err(|_| reject())?;
    if !mime.type_().as_str().eq_ignore_ascii_case(expected) {
        tracing::debug!(
            "Rejected upload sniffed as {} (expected {})",
            kind.mime_type(),
            expected
        );
        return Err(reject());
    }

    Ok(SniffedFile {
        buffer,
        ext: kind.extension().to_string(),
        mime_type: kind.mime_type().to_string(),
    })
}
