use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use bytes::BytesMut;
use std::path::Path;

use crate::AppState;
use crate::api::error::AppError;
use crate::config::MultipartLimits;
use crate::models::{
    DEFAULT_TRANSFER_ENCODING, FileUploadResponse, FormEntry, PersistOutcome, UploadedFilePart,
};
use crate::utils::validation::validate_file_size;

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// Cuts `value` to at most `limit` bytes on a char boundary.
fn truncate_value(mut value: String, limit: usize) -> (String, bool) {
    if value.len() <= limit {
        return (value, false);
    }
    let mut end = limit;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value.truncate(end);
    (value, true)
}

/// Buffers every multipart entry, enforcing `limits`.
async fn read_entries(
    multipart: &mut Multipart,
    limits: &MultipartLimits,
) -> Result<Vec<FormEntry>, AppError> {
    let mut entries = Vec::new();
    let mut file_count = 0;
    let mut field_count = 0;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let (name, name_truncated) = truncate_value(
            field.name().unwrap_or_default().to_string(),
            limits.field_name_size,
        );
        if name_truncated {
            tracing::debug!(
                "Field name truncated to {} bytes: {}",
                limits.field_name_size,
                name
            );
        }

        if let Some(original_name) = field.file_name().map(str::to_string) {
            file_count += 1;
            if file_count > limits.files {
                return Err(AppError::PayloadTooLarge(format!(
                    "At most {} file(s) may be uploaded per request",
                    limits.files
                )));
            }

            let encoding = field
                .headers()
                .get("content-transfer-encoding")
                .and_then(|v| v.to_str().ok())
                .unwrap_or(DEFAULT_TRANSFER_ENCODING)
                .to_string();
            let mime_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let ext = Path::new(&original_name)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_lowercase();

            let mut buffer = BytesMut::new();
            while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                validate_file_size(buffer.len() + chunk.len(), limits.file_size)?;
                buffer.extend_from_slice(&chunk);
            }

            tracing::debug!(
                "Received file field {} ({}, {} bytes)",
                name,
                original_name,
                buffer.len()
            );

            entries.push(FormEntry::File(UploadedFilePart {
                buffer: buffer.freeze(),
                field_name: name,
                original_name,
                ext,
                encoding,
                mime_type,
            }));
        } else {
            field_count += 1;
            if field_count > limits.fields {
                return Err(AppError::PayloadTooLarge(format!(
                    "At most {} plain field(s) may be sent per request",
                    limits.fields
                )));
            }

            let text = field.text().await.map_err(multipart_error)?;
            let (value, value_truncated) = truncate_value(text, limits.field_size);
            entries.push(FormEntry::Field {
                name,
                value,
                value_truncated,
            });
        }
    }

    Ok(entries)
}

/// 200 unless a provider error occurred; then that provider's status when it
/// is an error status, else 502.
pub fn response_status(outcomes: &[PersistOutcome]) -> StatusCode {
    outcomes
        .iter()
        .find_map(|outcome| match outcome {
            PersistOutcome::ProviderError(body) => Some(
                StatusCode::from_u16(body.status_code)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY),
            ),
            _ => None,
        })
        .unwrap_or(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/upload/image",
    request_body(content = Multipart, description = "One or more image files", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Files stored", body = Vec<FileUploadResponse>),
        (status = 400, description = "No file or malformed body"),
        (status = 413, description = "File size or count limit exceeded"),
        (status = 415, description = "File content is not an image")
    ),
    tag = "upload"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<FileUploadResponse>>), AppError> {
    let result: Result<Vec<PersistOutcome>, AppError> = async {
        let entries = read_entries(&mut multipart, &state.config.limits).await?;
        state.upload_service.process(entries).await
    }
    .await;

    match result {
        Ok(outcomes) => {
            let status = response_status(&outcomes);
            let body = outcomes.into_iter().map(FileUploadResponse::from).collect();
            Ok((status, Json(body)))
        }
        Err(e) => {
            // Drain the rest of the body so the client sees the error instead of a reset
            tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            Err(e)
        }
    }
}
