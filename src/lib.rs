pub mod api;
pub mod config;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::GatewayConfig;
use crate::services::gateway::GatewayService;
use axum::{
    Router,
    middleware::from_fn,
    routing::{delete, get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::files::list::list_files,
        api::handlers::files::list::retrieve_files,
        api::handlers::files::upload::upload_file,
        api::handlers::files::manage::delete_file,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            services::storage::ObjectMeta,
            services::gateway::UploadedFile,
            api::handlers::files::UploadResponse,
            api::handlers::files::DeleteResponse,
            api::handlers::files::ErrorResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "files", description = "Bucket listing, upload and delete"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayService>,
    pub config: GatewayConfig,
}

/// Multipart framing allowance on top of the file size limit.
const MULTIPART_OVERHEAD: usize = 10 * 1024 * 1024;

pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.max_file_size.saturating_add(MULTIPART_OVERHEAD);
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/list-files", get(api::handlers::files::list_files))
        .route("/retrieve-files", get(api::handlers::files::retrieve_files))
        .route("/upload", post(api::handlers::files::upload_file))
        .route("/delete/:key", delete(api::handlers::files::delete_file))
        .layer(TimeoutLayer::new(timeout))
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
