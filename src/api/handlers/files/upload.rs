use crate::api::error::AppError;
use crate::services::gateway::UploadRequest;
use crate::services::staging::StagedFile;
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;

use super::types::*;

fn multipart_error(e: MultipartError) -> AppError {
    let err_msg = e.to_string();
    if err_msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(err_msg)
    }
}

struct PendingUpload {
    staged: StagedFile,
    original_name: String,
    content_type: String,
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = Multipart, description = "Multipart form with a `file` part and an optional `folder` field", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File uploaded successfully", body = UploadResponse),
        (status = 400, description = "No file uploaded", body = ErrorResponse),
        (status = 413, description = "Upload too large", body = ErrorResponse),
        (status = 500, description = "Staging or store failure", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut folder: Option<String> = None;
    let mut pending: Option<PendingUpload> = None;

    let result: Result<Json<UploadResponse>, AppError> = async {
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            // A part only counts as a file when it carries a filename
            let file_name = field.file_name().map(str::to_string);

            if let (Some(file_name), "file") = (file_name, name.as_str()) {
                if pending.is_some() {
                    return Err(AppError::BadRequest(
                        "Only one file may be uploaded per request".to_string(),
                    ));
                }

                let original_name = if file_name.is_empty() {
                    "unnamed".to_string()
                } else {
                    file_name
                };
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());

                let reader = StreamReader::new(field.map_err(std::io::Error::other));
                let staged = state
                    .gateway
                    .stage_upload(reader, &original_name)
                    .await
                    .map_err(AppError::operation("Error uploading file"))?;

                pending = Some(PendingUpload {
                    staged,
                    original_name,
                    content_type,
                });
            } else if name == "folder" {
                let text = field.text().await.map_err(multipart_error)?;
                folder = Some(text);
            }
        }

        let Some(upload) = pending.take() else {
            return Err(AppError::BadRequest("No file uploaded".to_string()));
        };

        let file = state
            .gateway
            .upload(
                upload.staged,
                UploadRequest {
                    original_name: upload.original_name,
                    target_folder: folder.take(),
                    content_type: upload.content_type,
                },
            )
            .await
            .map_err(AppError::operation("Error uploading file"))?;

        Ok(Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            file,
        }))
    }
    .await;

    match result {
        Ok(res) => Ok(res),
        Err(e) => {
            // Drain the rest of the body so the client sees the response instead of a reset
            tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            Err(e)
        }
    }
}
