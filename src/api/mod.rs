//! HTTP 接口层
//!
//! 路由、上传读取和 JSON 响应。业务逻辑都在 `workflow` 中。

pub mod handlers;
pub mod multipart;
pub mod response;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use response::{ApiError, ApiResponse, ApiResult};
pub use state::AppState;

/// 构建路由
///
/// 两个上传接口关闭默认的请求体大小限制，上传大小由 [`multipart::UploadForm`] 按块检查；
/// 其余接口保留 axum 默认的 2MB 上限。
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route(
            "/api/process-homework",
            post(handlers::process_homework).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/test", get(handlers::test))
        .route("/api/health", get(handlers::health))
        .route(
            "/api/test-ocr",
            post(handlers::test_ocr).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/test-ai", post(handlers::test_ai))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
