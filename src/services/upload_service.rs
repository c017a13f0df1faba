use futures::future::try_join_all;
use std::sync::Arc;

use crate::api::error::AppError;
use crate::config::UploadConfig;
use crate::models::{FormEntry, PersistOptions, PersistOutcome, RenameFile, UploadedFilePart};
use crate::services::cloud::CloudPersister;
use crate::services::local::LocalPersister;
use crate::services::storage::ObjectStore;
use crate::services::validator::validate_file_type;
use crate::utils::filename::FilenameHashOptions;
use crate::utils::validation::sanitize_filename;

#[derive(Clone)]
enum Destination {
    Local(LocalPersister),
    Cloud(CloudPersister),
}

/// Validates the file parts of one request and persists them.
pub struct UploadService {
    config: Arc<UploadConfig>,
    destination: Destination,
}

impl UploadService {
    /// Persists to `{public_dir}/{image_dir}` on local disk.
    pub fn local(config: Arc<UploadConfig>) -> Self {
        let persister = LocalPersister::new(config.server_domain.clone());
        Self {
            config,
            destination: Destination::Local(persister),
        }
    }

    /// Persists to `store`, staging through `config.temp_dir`.
    pub fn cloud(config: Arc<UploadConfig>, store: Arc<dyn ObjectStore>) -> Self {
        let persister = CloudPersister::new(store, config.temp_dir.clone());
        Self {
            config,
            destination: Destination::Cloud(persister),
        }
    }

    pub fn is_cloud(&self) -> bool {
        matches!(self.destination, Destination::Cloud(_))
    }

    fn persist_options(&self) -> PersistOptions {
        PersistOptions {
            file_dir: match self.destination {
                Destination::Local(_) => Some(self.config.image_dir.clone()),
                Destination::Cloud(_) => None,
            },
            prefix: self.config.file_prefix.clone(),
            rename: RenameFile::Enabled(FilenameHashOptions {
                add_random_string: self.config.hash_add_random_string,
                algorithm: self.config.hash_algorithm,
                encoding: self.config.hash_encoding,
                ..Default::default()
            }),
        }
    }

    async fn persist(
        &self,
        part: &UploadedFilePart,
        options: &PersistOptions,
    ) -> Result<PersistOutcome, AppError> {
        match &self.destination {
            Destination::Local(local) => local
                .persist(part, &self.config.image_path(), options)
                .await
                .map(PersistOutcome::Stored),
            Destination::Cloud(cloud) => cloud.persist(part, None, options).await,
        }
    }

    /// Validates every file entry, then persists them concurrently.
    ///
    /// The first file failing type or filename validation aborts the request
    /// before anything is written. Outcomes are returned in request order.
    pub async fn process(&self, entries: Vec<FormEntry>) -> Result<Vec<PersistOutcome>, AppError> {
        let mut files = Vec::new();

        for entry in entries {
            match entry {
                FormEntry::File(part) => {
                    sanitize_filename(&part.original_name)?;
                    let sniffed =
                        validate_file_type(part.buffer.clone(), &self.config.expected_category)?;
                    if !part.ext.is_empty() && part.ext != sniffed.ext {
                        tracing::debug!(
                            "Declared extension '{}' differs from sniffed '{}' for {}",
                            part.ext,
                            sniffed.ext,
                            part.original_name
                        );
                    }
                    files.push(UploadedFilePart {
                        buffer: sniffed.buffer,
                        ext: sniffed.ext,
                        mime_type: sniffed.mime_type,
                        ..part
                    });
                }
                FormEntry::Field {
                    name,
                    value,
                    value_truncated,
                } => {
                    tracing::debug!(
                        "Ignoring form field {}={:?} (truncated: {})",
                        name,
                        value,
                        value_truncated
                    );
                }
            }
        }

        if files.is_empty() {
            return Err(AppError::NoFile);
        }

        let options = self.persist_options();
        try_join_all(files.iter().map(|part| self.persist(part, &options))).await
    }
}
