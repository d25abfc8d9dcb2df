use crate::api::error::AppError;
use crate::services::storage::ObjectMeta;
use axum::{
    Json,
    extract::{Query, State},
};

use super::types::*;

#[utoipa::path(
    get,
    path = "/list-files",
    params(ListFilesQuery),
    responses(
        (status = 200, description = "Objects under the folder, optionally filtered by suffix", body = Vec<ObjectMeta>),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<crate::AppState>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<Vec<ObjectMeta>>, AppError> {
    let files = state
        .gateway
        .list_files(query.folder.as_deref(), query.file_type.as_deref())
        .await
        .map_err(AppError::operation("Error fetching files"))?;

    Ok(Json(files))
}

#[utoipa::path(
    get,
    path = "/retrieve-files",
    responses(
        (status = 200, description = "Every object in the bucket", body = Vec<ObjectMeta>),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn retrieve_files(
    State(state): State<crate::AppState>,
) -> Result<Json<Vec<ObjectMeta>>, AppError> {
    let files = state
        .gateway
        .retrieve_files()
        .await
        .map_err(AppError::operation("Error retrieving files"))?;

    Ok(Json(files))
}
