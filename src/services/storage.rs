use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::models::ProviderErrorBody;

/// Cache header applied to every uploaded object.
pub const CACHE_CONTROL: &str = "public, max-age=31536000";
pub const CONTENT_LANGUAGE: &str = "en";

#[derive(Debug, Error)]
pub enum StoreError {
    /// The provider answered with an error; carried as data to the caller.
    #[error("Provider error {}: {}", .0.status_code, .0.message)]
    Provider(ProviderErrorBody),

    #[error("Failed to read upload source: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP attributes and user metadata attached to an uploaded object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectAttributes {
    pub cache_control: String,
    pub content_language: String,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
    pub public_read: bool,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
    /// Uploads the file at `source` under `key`.
    async fn upload_file(
        &self,
        key: &str,
        source: &Path,
        attributes: &ObjectAttributes,
    ) -> Result<(), StoreError>;
    /// Base URL objects are reachable under, without the bucket.
    fn endpoint(&self) -> String;
    fn bucket(&self) -> &str;
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    endpoint: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String, endpoint: String) -> Self {
        Self {
            client,
            bucket,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }
}

fn provider_error<E>(err: SdkError<E, HttpResponse>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status_code = err
        .raw_response()
        .map(|r| r.status().as_u16())
        .unwrap_or(502);
    let code = err.code().map(str::to_string);
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    tracing::error!(
        "Object store request failed: status={}, code={:?}, error={}",
        status_code,
        code,
        DisplayErrorContext(&err)
    );

    StoreError::Provider(ProviderErrorBody {
        status_code,
        code,
        message,
    })
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    Ok(false)
                } else {
                    Err(provider_error(e))
                }
            }
        }
    }

    async fn upload_file(
        &self,
        key: &str,
        source: &Path,
        attributes: &ObjectAttributes,
    ) -> Result<(), StoreError> {
        let data = tokio::fs::read(source).await?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .cache_control(&attributes.cache_control)
            .content_language(&attributes.content_language)
            .content_type(&attributes.content_type)
            .set_metadata(Some(attributes.metadata.clone()));

        if attributes.public_read {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        request.send().await.map_err(provider_error)?;
        Ok(())
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// An object kept by [`MemoryObjectStore`].
#[derive(Debug, Clone)]
pub struct MemoryObject {
    pub body: Bytes,
    pub attributes: ObjectAttributes,
}

/// Process-local object store, used for tests and offline runs.
pub struct MemoryObjectStore {
    bucket: String,
    endpoint: String,
    objects: DashMap<String, MemoryObject>,
    failure: Option<ProviderErrorBody>,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            endpoint: endpoint.into(),
            objects: DashMap::new(),
            failure: None,
        }
    }

    /// A store whose uploads always fail with `error`.
    pub fn failing(
        bucket: impl Into<String>,
        endpoint: impl Into<String>,
        error: ProviderErrorBody,
    ) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(bucket, endpoint)
        }
    }

    pub fn get(&self, key: &str) -> Option<MemoryObject> {
        self.objects.get(key).map(|o| o.value().clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.objects.contains_key(key))
    }

    async fn upload_file(
        &self,
        key: &str,
        source: &Path,
        attributes: &ObjectAttributes,
    ) -> Result<(), StoreError> {
        if let Some(error) = &self.failure {
            return Err(StoreError::Provider(error.clone()));
        }

        let body = tokio::fs::read(source).await?;
        self.objects.insert(
            key.to_string(),
            MemoryObject {
                body: Bytes::from(body),
                attributes: attributes.clone(),
            },
        );
        Ok(())
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryObjectStore::new("bucket", "https://storage.example.com");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"pixels").unwrap();

        assert!(!store.exists("a/b.png").await.unwrap());
        store
            .upload_file("a/b.png", file.path(), &ObjectAttributes::default())
            .await
            .unwrap();
        assert!(store.exists("a/b.png").await.unwrap());
        assert_eq!(store.get("a/b.png").unwrap().body.as_ref(), b"pixels");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_store() {
        let store = MemoryObjectStore::failing(
            "bucket",
            "https://storage.example.com",
            ProviderErrorBody {
                status_code: 403,
                code: Some("AccessDenied".to_string()),
                message: "Access Denied".to_string(),
            },
        );
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = store
            .upload_file("x.png", file.path(), &ObjectAttributes::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Provider(ref body) if body.status_code == 403));
        assert!(store.is_empty());
    }
}
