use crate::services::gateway::UploadedFile;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListFilesQuery {
    /// Key prefix to list under
    pub folder: Option<String>,
    /// Key suffix to keep, e.g. `.pdf`
    #[serde(rename = "fileType")]
    pub file_type: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub file: UploadedFile,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    pub message: String,
    pub key: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
    pub error: Option<String>,
}
