//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{auth::auth_middleware, handlers, middleware::AppState};

/// multipart 边界与表单字段的额外空间
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// 上传请求的总大小上限：三个文件加上 multipart 开销
pub fn upload_body_limit(max_file_bytes: usize) -> usize {
    max_file_bytes
        .saturating_mul(3)
        .saturating_add(MULTIPART_OVERHEAD_BYTES)
}

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 认证路由（无需认证）
    let auth_routes = Router::new()
        .route("/api/v1/auth/register", post(handlers::auth::register))
        .route("/api/v1/auth/login", post(handlers::auth::login));

    // 上传路由单独设置请求体上限
    let upload_routes = Router::new()
        .route("/api/v1/uploads", post(handlers::upload::upload_files))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_body_limit(
            state.config.uploads.max_file_bytes,
        )));

    // 需要认证的路由
    let authenticated_routes = Router::new()
        .route("/api/v1/auth/me", get(handlers::auth::get_current_user))
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .route("/api/v1/dashboard", get(handlers::dashboard::get_dashboard))
        .merge(upload_routes)
        // 报表
        .route("/api/v1/reports/generate", post(handlers::report::generate_report))
        .route("/api/v1/reports/latest", get(handlers::report::latest_report))
        // 管理端（角色在服务层检查）
        .route("/api/v1/admin/users", get(handlers::admin::list_users))
        .route(
            "/api/v1/admin/users/{id}/role",
            put(handlers::admin::update_user_role),
        )
        .route("/api/v1/admin/audit-logs", get(handlers::admin::list_audit_logs))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // 组合所有路由
    Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            crate::middleware::request_tracking_middleware,
        ))
        .with_state(state)
}
