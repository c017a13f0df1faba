use std::io::ErrorKind;
use std::path::Path;

use crate::api::error::AppError;
use crate::models::{PersistOptions, RenameFile, StoredFileResult, UploadedFilePart};
use crate::utils::filename::hash_filename;
use crate::utils::validation::sanitize_filename;

/// Writes uploads under a local directory that is served publicly.
#[derive(Debug, Clone)]
pub struct LocalPersister {
    server_domain: String,
}

/// Joins the public URL of a stored file.
pub fn public_url(server_domain: &str, file_dir: Option<&str>, filename: &str) -> String {
    match file_dir.filter(|d| !d.is_empty()) {
        Some(dir) => format!("{}/{}/{}", server_domain, dir.trim_matches('/'), filename),
        None => format!("{}/{}", server_domain, filename),
    }
}

impl LocalPersister {
    pub fn new(server_domain: impl Into<String>) -> Self {
        Self {
            server_domain: server_domain.into(),
        }
    }

    /// Writes `part` into `dest_dir` as `{prefix}{hash}.{ext}`, or as
    /// `{prefix}{name}` when renaming is disabled.
    ///
    /// The bytes are staged under a unique name and moved into place without
    /// replacing an existing file. A hashed name that already exists holds the
    /// same content and is reported as stored; a plain name that already
    /// exists is a [`AppError::Conflict`].
    pub async fn persist(
        &self,
        part: &UploadedFilePart,
        dest_dir: &Path,
        options: &PersistOptions,
    ) -> Result<StoredFileResult, AppError> {
        let original_name = sanitize_filename(&part.original_name)?;
        let mut filename = format!("{}{}", options.prefix, original_name);

        tokio::fs::create_dir_all(dest_dir).await?;
        // Deleted when dropped unless moved into place
        let staged = tempfile::Builder::new()
            .prefix(&filename)
            .tempfile_in(dest_dir)?;
        tokio::fs::write(staged.path(), &part.buffer).await?;

        if let RenameFile::Enabled(hash_options) = &options.rename {
            let stem = hash_filename(staged.path(), &part.original_name, hash_options).await?;
            filename = format!("{}{}.{}", options.prefix, stem, part.ext);
        }

        let final_path = dest_dir.join(&filename);
        match staged.persist_noclobber(&final_path) {
            Ok(_) => {
                tracing::info!(
                    "Stored {} ({} bytes) as {}",
                    part.original_name,
                    part.buffer.len(),
                    final_path.display()
                );
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                if options.rename == RenameFile::Disabled {
                    return Err(AppError::Conflict(filename));
                }
                tracing::info!(
                    "{} already stored as {}, keeping the existing file",
                    part.original_name,
                    final_path.display()
                );
            }
            Err(e) => return Err(e.error.into()),
        }

        let url = public_url(&self.server_domain, options.file_dir.as_deref(), &filename);

        Ok(StoredFileResult {
            encoding: part.encoding.clone(),
            field_name: part.field_name.clone(),
            filename,
            ext: part.ext.clone(),
            mime_type: part.mime_type.clone(),
            original_name: part.original_name.clone(),
            url,
            api_endpoint: None,
        })
    }
}
