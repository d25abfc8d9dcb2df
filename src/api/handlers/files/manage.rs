use crate::api::error::AppError;
use axum::{
    Json,
    extract::{Path, State},
};

use super::types::*;

#[utoipa::path(
    delete,
    path = "/delete/{key}",
    params(
        ("key" = String, Path, description = "Percent-encoded object key")
    ),
    responses(
        (status = 200, description = "Object deleted (or already absent)", body = DeleteResponse),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn delete_file(
    State(state): State<crate::AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    state
        .gateway
        .delete(&key)
        .await
        .map_err(AppError::operation("Error deleting file"))?;

    Ok(Json(DeleteResponse {
        message: "File deleted successfully".to_string(),
        key,
    }))
}
