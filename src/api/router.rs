use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::api::{accounts, batch, downloads, drafts, extract, templates};
use crate::AppState;

/// Simple request logger middleware
async fn log_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    tracing::info!(">>> {} {}", method, uri);
    let res = next.run(req).await;
    tracing::info!("<<< {} {} -> {}", method, uri, res.status());
    res
}

/// GET /api/: answers once the server is ready
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Statement Draft Generator API" }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION])
}

/// Build the HTTP API router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/api", get(root))
        .route("/api/", get(root))
        // Template and sender stores
        .route(
            "/api/templates",
            get(templates::list_templates).post(templates::create_template),
        )
        .route("/api/templates/:id", delete(templates::delete_template))
        .route(
            "/api/email-accounts",
            get(accounts::list_accounts).post(accounts::create_account),
        )
        .route("/api/email-accounts/:id", delete(accounts::delete_account))
        // Extraction
        .route("/api/pdf/extract", post(extract::extract_folder))
        .route("/api/pdf/upload-extract", post(extract::upload_extract))
        // Drafts
        .route("/api/outlook/draft", post(drafts::create_draft))
        .route("/api/outlook/draft-upload", post(drafts::create_draft_upload))
        .route("/api/outlook/batch", post(batch::run_batch))
        .route("/api/outlook/batch-drafts", post(batch::run_upload_batch))
        // Generated files
        .route("/api/reports", post(batch::save_report_file))
        .route("/api/downloads/*path", get(downloads::download))
        .layer(middleware::from_fn(log_middleware))
        .layer(axum::extract::DefaultBodyLimit::max(256 * 1024 * 1024))
        .layer(cors)
        .with_state(state)
}
