use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::error::AppError;
use crate::models::{
    PersistOptions, PersistOutcome, RenameFile, StoredFileResult, UploadedFilePart,
};
use crate::services::storage::{
    CACHE_CONTROL, CONTENT_LANGUAGE, ObjectAttributes, ObjectStore, StoreError,
};
use crate::utils::filename::hash_filename;
use crate::utils::validation::sanitize_filename;

/// Stages uploads in a local temp file and pushes them to an object store.
#[derive(Clone)]
pub struct CloudPersister {
    store: Arc<dyn ObjectStore>,
    temp_dir: PathBuf,
}

impl CloudPersister {
    pub fn new(store: Arc<dyn ObjectStore>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            temp_dir: temp_dir.into(),
        }
    }

    /// Object key for `filename` under the optional bucket sub-path.
    pub fn object_key(dest_path: Option<&str>, filename: &str) -> String {
        match dest_path.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
            Some(path) => format!("{}/{}", path, filename),
            None => filename.to_string(),
        }
    }

    /// Persists `part` to the object store.
    ///
    /// An object already present under the computed key is reported as
    /// [`PersistOutcome::AlreadyStored`] without uploading. Provider failures
    /// come back as [`PersistOutcome::ProviderError`]; only local failures are
    /// returned as `Err`. The staged temp file is removed on every path.
    pub async fn persist(
        &self,
        part: &UploadedFilePart,
        dest_path: Option<&str>,
        options: &PersistOptions,
    ) -> Result<PersistOutcome, AppError> {
        let original_name = sanitize_filename(&part.original_name)?;
        let mut filename = format!("{}{}", options.prefix, original_name);

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        // Deleted when dropped, whichever way this function returns
        let staged = tempfile::Builder::new()
            .prefix(&filename)
            .tempfile_in(&self.temp_dir)?;
        tokio::fs::write(staged.path(), &part.buffer).await?;

        if let RenameFile::Enabled(hash_options) = &options.rename {
            let stem = hash_filename(staged.path(), &part.original_name, hash_options).await?;
            filename = format!("{}{}.{}", options.prefix, stem, part.ext);
        }

        let key = Self::object_key(dest_path, &filename);
        let endpoint = self.store.endpoint();
        let stored = StoredFileResult {
            encoding: part.encoding.clone(),
            field_name: part.field_name.clone(),
            filename: filename.clone(),
            ext: part.ext.clone(),
            mime_type: part.mime_type.clone(),
            original_name: part.original_name.clone(),
            url: format!("{}/{}/{}", endpoint, self.store.bucket(), key),
            api_endpoint: Some(endpoint),
        };

        match self.store.exists(&key).await {
            Ok(true) => {
                tracing::info!("Object {} already exists, skipping upload", key);
                return Ok(PersistOutcome::AlreadyStored(stored));
            }
            Ok(false) => {}
            Err(StoreError::Provider(body)) => return Ok(PersistOutcome::ProviderError(body)),
            Err(StoreError::Io(e)) => return Err(e.into()),
        }

        let attributes = ObjectAttributes {
            cache_control: CACHE_CONTROL.to_string(),
            content_language: CONTENT_LANGUAGE.to_string(),
            content_type: part.mime_type.clone(),
            metadata: HashMap::from([
                ("fieldname".to_string(), part.field_name.clone()),
                ("encoding".to_string(), part.encoding.clone()),
                ("mimetype".to_string(), part.mime_type.clone()),
                ("name".to_string(), filename.clone()),
                ("originalname".to_string(), part.original_name.clone()),
            ]),
            public_read: true,
        };

        match self.store.upload_file(&key, staged.path(), &attributes).await {
            Ok(()) => {
                tracing::info!(
                    "Uploaded {} ({} bytes) to {}/{}",
                    part.original_name,
                    part.buffer.len(),
                    self.store.bucket(),
                    key
                );
                Ok(PersistOutcome::Stored(stored))
            }
            Err(StoreError::Provider(body)) => Ok(PersistOutcome::ProviderError(body)),
            Err(StoreError::Io(e)) => Err(e.into()),
        }
    }
}
