use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use regex::Regex;
use rust_image_upload::config::UploadConfig;
use rust_image_upload::models::ProviderErrorBody;
use rust_image_upload::services::storage::MemoryObjectStore;
use rust_image_upload::services::upload_service::UploadService;
use rust_image_upload::{AppState, create_app};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "---------------------------123456789012345678901234567";

/// 1x1 transparent PNG.
const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

enum Part<'a> {
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: {}\r\n\r\n",
                        name, filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}",
                        name, value
                    )
                    .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn test_config(root: &Path) -> UploadConfig {
    let _ = tracing_subscriber::fmt::try_init();
    UploadConfig {
        public_dir: root.join("public"),
        temp_dir: root.join("upload"),
        server_domain: "https://img.example.com".to_string(),
        bucket_name: "media".to_string(),
        ..Default::default()
    }
}

fn local_app(config: UploadConfig) -> Router {
    let config = Arc::new(config);
    create_app(AppState {
        config: config.clone(),
        upload_service: Arc::new(UploadService::local(config)),
    })
}

fn cloud_app(config: UploadConfig, store: Arc<MemoryObjectStore>) -> Router {
    let config = Arc::new(UploadConfig {
        upload_to_cloud: true,
        ..config
    });
    create_app(AppState {
        config: config.clone(),
        upload_service: Arc::new(UploadService::cloud(config, store)),
    })
}

async fn post_upload(app: Router, body: Vec<u8>) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload/image")
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap_or_else(|_| {
        panic!(
            "Non-JSON response with status {}: {:?}",
            status,
            String::from_utf8_lossy(&body)
        )
    });
    (status, json)
}

fn png_part<'a>(filename: &'a str) -> Part<'a> {
    Part::File {
        name: "file",
        filename,
        content_type: "image/png",
        data: PNG_1X1,
    }
}

#[tokio::test]
async fn test_upload_png_to_local_disk() {
    let root = tempfile::tempdir().unwrap();
    let app = local_app(test_config(root.path()));

    let (status, json) = post_upload(app, multipart_body(&[png_part("cat.png")])).await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {}", json);

    let files = json.as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["status"], "stored");

    let file = &files[0]["file"];
    let filename = file["filename"].as_str().unwrap();
    let url = file["url"].as_str().unwrap();

    let pattern = Regex::new(r"^img\.[0-9a-f]{5}[0-9]{3}\.[0-9a-f]{32}\.png$").unwrap();
    assert!(pattern.is_match(filename), "unexpected filename {}", filename);
    assert!(url.ends_with(".png"));
    assert_eq!(url, format!("https://img.example.com/images/{}", filename));
    assert_eq!(file["mimetype"], "image/png");
    assert_eq!(file["ext"], "png");
    assert_eq!(file["fieldname"], "file");
    assert_eq!(file["originalName"], "cat.png");
    assert_eq!(file["encoding"], "7bit");

    let stored = root.path().join("public/images").join(filename);
    assert_eq!(std::fs::read(stored).unwrap(), PNG_1X1);
    assert!(!root.path().join("public/images/img.cat.png").exists());
}

#[tokio::test]
async fn test_upload_ignores_plain_fields() {
    let root = tempfile::tempdir().unwrap();
    let app = local_app(test_config(root.path()));

    let body = multipart_body(&[
        Part::Text {
            name: "caption",
            value: "my cat",
        },
        png_part("cat.png"),
    ]);
    let (status, json) = post_upload(app, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_rejects_non_image() {
    let root = tempfile::tempdir().unwrap();
    let app = local_app(test_config(root.path()));

    let body = multipart_body(&[Part::File {
        name: "file",
        filename: "fake.png",
        content_type: "image/png",
        data: b"%PDF-1.5 definitely not an image",
    }]);
    let (status, json) = post_upload(app, body).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json["code"], "INVALID_FILE_TYPE");
    assert_eq!(json["statusCode"], 415);
    assert_eq!(json["message"], "Server accepts only image type");
    assert!(!root.path().join("public/images").exists());
}

#[tokio::test]
async fn test_upload_expected_category_is_configurable() {
    let root = tempfile::tempdir().unwrap();
    let app = local_app(UploadConfig {
        expected_category: "video".to_string(),
        ..test_config(root.path())
    });

    let (status, json) = post_upload(app, multipart_body(&[png_part("cat.png")])).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json["message"], "Server accepts only video type");
}

#[tokio::test]
async fn test_upload_without_file() {
    let root = tempfile::tempdir().unwrap();
    let app = local_app(test_config(root.path()));

    let body = multipart_body(&[Part::Text {
        name: "caption",
        value: "nothing attached",
    }]);
    let (status, json) = post_upload(app, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "NO_FILE");
}

#[tokio::test]
async fn test_upload_file_too_large() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    config.limits.file_size = 16;
    let app = local_app(config);

    let (status, json) = post_upload(app, multipart_body(&[png_part("cat.png")])).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn test_upload_too_many_files() {
    let root = tempfile::tempdir().unwrap();
    let app = local_app(test_config(root.path()));

    let body = multipart_body(&[png_part("one.png"), png_part("two.png")]);
    let (status, json) = post_upload(app, body).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn test_upload_multiple_files_returns_all_results() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    config.limits.files = 3;
    let app = local_app(config);

    let body = multipart_body(&[
        png_part("one.png"),
        png_part("two.png"),
        png_part("three.png"),
    ]);
    let (status, json) = post_upload(app, body).await;

    assert_eq!(status, StatusCode::OK);
    let files = json.as_array().unwrap();
    assert_eq!(files.len(), 3);
    let names: Vec<&str> = files
        .iter()
        .map(|f| f["file"]["originalName"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["one.png", "two.png", "three.png"]);
}

#[tokio::test]
async fn test_upload_to_cloud_and_skip_duplicate() {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryObjectStore::new("media", "https://storage.example.com"));
    let config = UploadConfig {
        hash_add_random_string: false,
        ..test_config(root.path())
    };
    let app = cloud_app(config, store.clone());

    let (status, json) = post_upload(app.clone(), multipart_body(&[png_part("cat.png")])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["status"], "stored");
    let first_url = json[0]["file"]["url"].as_str().unwrap().to_string();
    assert!(first_url.starts_with("https://storage.example.com/media/img."));
    assert_eq!(json[0]["file"]["apiEndpoint"], "https://storage.example.com");
    assert_eq!(store.len(), 1);

    // Temp staging directory is left empty
    let staged = std::fs::read_dir(root.path().join("upload")).unwrap().count();
    assert_eq!(staged, 0);

    // Second upload of the same file is reported without a new object
    let (status, json) = post_upload(app, multipart_body(&[png_part("cat.png")])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["status"], "already_stored");
    assert_eq!(json[0]["file"]["url"], first_url.as_str());
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_upload_truncates_long_field_name() {
    let root = tempfile::tempdir().unwrap();
    let app = local_app(test_config(root.path()));

    let long_name = "f".repeat(150);
    let body = multipart_body(&[Part::File {
        name: &long_name,
        filename: "cat.png",
        content_type: "image/png",
        data: PNG_1X1,
    }]);
    let (status, json) = post_upload(app, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["file"]["fieldname"], "f".repeat(100));
}

#[tokio::test]
async fn test_upload_mixed_batch_with_hidden_name_writes_nothing() {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(root.path());
    config.limits.files = 2;
    let app = local_app(config);

    let body = multipart_body(&[png_part("cat.png"), png_part(".hidden.png")]);
    let (status, json) = post_upload(app, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(!root.path().join("public/images").exists());
}

#[tokio::test]
async fn test_upload_cloud_provider_error() {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryObjectStore::failing(
        "media",
        "https://storage.example.com",
        ProviderErrorBody {
            status_code: 403,
            code: Some("AccessDenied".to_string()),
            message: "Access Denied".to_string(),
        },
    ));
    let app = cloud_app(test_config(root.path()), store);

    let (status, json) = post_upload(app, multipart_body(&[png_part("cat.png")])).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json[0]["status"], "failed");
    assert_eq!(json[0]["error"]["code"], "AccessDenied");
    assert_eq!(json[0]["error"]["statusCode"], 403);
}

#[tokio::test]
async fn test_health_reports_storage_mode() {
    let root = tempfile::tempdir().unwrap();
    let app = local_app(test_config(root.path()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["storage"], "local");
}
