use crate::utils::hash::{HashAlgorithm, HashEncoding, HashError};
use std::env;
use std::path::PathBuf;

/// Limits applied while reading a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartLimits {
    /// Max field name size in bytes
    pub field_name_size: usize,
    /// Max plain field value size in bytes; longer values are truncated
    pub field_size: usize,
    /// Max number of non-file fields
    pub fields: usize,
    /// Max size of a single file in bytes
    pub file_size: usize,
    /// Max number of file fields
    pub files: usize,
}

impl Default for MultipartLimits {
    fn default() -> Self {
        Self {
            field_name_size: 100,
            field_size: 100,
            fields: 10,
            file_size: 1_000_000,
            files: 1,
        }
    }
}

/// Connection settings for an S3 compatible object store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectStoreConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

/// Upload service configuration, read once at startup
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Bucket receiving cloud uploads (default: "")
    pub bucket_name: String,

    /// Sub-directory of the public root holding local images (default: "images")
    pub image_dir: String,

    /// Root directory whose content is publicly reachable (default: "public")
    pub public_dir: PathBuf,

    /// Scratch directory for files staged before a cloud upload (default: "upload")
    pub temp_dir: PathBuf,

    /// Public origin used to build local file URLs (default: "")
    pub server_domain: String,

    /// Bind host (default: "0.0.0.0")
    pub server_host: String,

    /// Bind port (default: 3000)
    pub server_port: u16,

    /// Persist to the object store instead of local disk (default: false)
    pub upload_to_cloud: bool,

    /// Prefix prepended to every stored filename (default: "img.")
    pub file_prefix: String,

    /// Top-level MIME category accepted by the endpoint (default: "image")
    pub expected_category: String,

    /// Digest algorithm for filename hashing (default: md5)
    pub hash_algorithm: HashAlgorithm,

    /// Digest rendering for filename hashing (default: hex)
    pub hash_encoding: HashEncoding,

    /// Mix a time nonce into hashed filenames (default: true)
    pub hash_add_random_string: bool,

    pub limits: MultipartLimits,

    pub object_store: ObjectStoreConfig,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            bucket_name: String::new(),
            image_dir: "images".to_string(),
            public_dir: PathBuf::from("public"),
            temp_dir: PathBuf::from("upload"),
            server_domain: String::new(),
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            upload_to_cloud: false,
            file_prefix: "img.".to_string(),
            expected_category: "image".to_string(),
            hash_algorithm: HashAlgorithm::Md5,
            hash_encoding: HashEncoding::Hex,
            hash_add_random_string: true,
            limits: MultipartLimits::default(),
            object_store: ObjectStoreConfig {
                region: "us-east-1".to_string(),
                ..Default::default()
            },
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

impl UploadConfig {
    /// Load configuration from environment variables.
    ///
    /// Fails only when the configured hash algorithm or encoding is unknown.
    pub fn from_env() -> Result<Self, HashError> {
        let default = Self::default();

        let hash_algorithm = match env::var("HASH_ALGORITHM") {
            Ok(v) => v.parse()?,
            Err(_) => default.hash_algorithm,
        };
        let hash_encoding = match env::var("HASH_ENCODING") {
            Ok(v) => v.parse()?,
            Err(_) => default.hash_encoding,
        };

        Ok(Self {
            bucket_name: env::var("BUCKET_NAME").unwrap_or(default.bucket_name),

            image_dir: env::var("IMAGE_DIR").unwrap_or(default.image_dir),

            public_dir: env::var("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.public_dir),

            temp_dir: env::var("UPLOAD_TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.temp_dir),

            server_domain: env::var("SERVER_DOMAIN")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(default.server_domain),

            server_host: env::var("SERVER_HOST").unwrap_or(default.server_host),

            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.server_port),

            upload_to_cloud: env::var("UPLOAD_TO_CLOUD")
                .map(|v| parse_bool(&v))
                .unwrap_or(default.upload_to_cloud),

            file_prefix: env::var("UPLOAD_FILE_PREFIX").unwrap_or(default.file_prefix),

            expected_category: env::var("EXPECTED_CATEGORY")
                .unwrap_or(default.expected_category),

            hash_algorithm,
            hash_encoding,

            hash_add_random_string: env::var("HASH_ADD_RANDOM_STRING")
                .map(|v| parse_bool(&v))
                .unwrap_or(default.hash_add_random_string),

            limits: MultipartLimits {
                file_size: env::var("MAX_FILE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.limits.file_size),
                files: env::var("MAX_FILES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.limits.files),
                ..default.limits
            },

            object_store: ObjectStoreConfig {
                endpoint: env::var("S3_ENDPOINT").ok(),
                region: env::var("S3_REGION").unwrap_or(default.object_store.region),
                access_key: env::var("S3_ACCESS_KEY").ok(),
                secret_key: env::var("S3_SECRET_KEY").ok(),
            },

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        })
    }

    /// Directory local images are written to: `{public_dir}/{image_dir}`.
    pub fn image_path(&self) -> PathBuf {
        self.public_dir.join(&self.image_dir)
    }

    /// Upper bound for a whole request body, leaving room for multipart framing.
    pub fn body_limit(&self) -> usize {
        self.limits.file_size * self.limits.files.max(1) + 64 * 1024
    }
}
