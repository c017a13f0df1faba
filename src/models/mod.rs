use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::utils::filename::FilenameHashOptions;

/// Transfer encoding reported when a multipart part carries none.
pub const DEFAULT_TRANSFER_ENCODING: &str = "7bit";

/// A fully buffered file field from a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFilePart {
    pub buffer: Bytes,
    pub field_name: String,
    pub original_name: String,
    /// Extension without the leading dot. Holds the sniffed value once the
    /// part went through the type validator.
    pub ext: String,
    pub encoding: String,
    pub mime_type: String,
}

/// A multipart entry, either a file or a plain value.
#[derive(Debug, Clone)]
pub enum FormEntry {
    File(UploadedFilePart),
    Field {
        name: String,
        value: String,
        value_truncated: bool,
    },
}

/// Whether a persisted file keeps its (prefixed) original name or gets a
/// hashed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameFile {
    Disabled,
    Enabled(FilenameHashOptions),
}

impl Default for RenameFile {
    fn default() -> Self {
        RenameFile::Enabled(FilenameHashOptions::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PersistOptions {
    /// Public sub-directory inserted into local URLs.
    pub file_dir: Option<String>,
    pub prefix: String,
    pub rename: RenameFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredFileResult {
    pub encoding: String,
    #[serde(rename = "fieldname")]
    pub field_name: String,
    pub filename: String,
    pub ext: String,
    #[serde(rename = "mimetype")]
    pub mime_type: String,
    #[serde(rename = "originalName")]
    pub original_name: String,
    pub url: String,
    #[serde(rename = "apiEndpoint", skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
}

/// Error returned by the object store provider, kept as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProviderErrorBody {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

/// Result of persisting one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Stored(StoredFileResult),
    /// An object with the computed name already existed; nothing was uploaded.
    AlreadyStored(StoredFileResult),
    ProviderError(ProviderErrorBody),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Stored,
    AlreadyStored,
    Failed,
}

/// Per-file entry of the upload response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FileUploadResponse {
    pub status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<StoredFileResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderErrorBody>,
}

impl From<PersistOutcome> for FileUploadResponse {
    fn from(outcome: PersistOutcome) -> Self {
        match outcome {
            PersistOutcome::Stored(file) => Self {
                status: UploadStatus::Stored,
                file: Some(file),
                error: None,
            },
            PersistOutcome::AlreadyStored(file) => Self {
                status: UploadStatus::AlreadyStored,
                file: Some(file),
                error: None,
            },
            PersistOutcome::ProviderError(error) => Self {
                status: UploadStatus::Failed,
                file: None,
                error: Some(error),
            },
        }
    }
}
