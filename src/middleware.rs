//! HTTP 中间件与应用状态
//! 请求追踪、客户端信息提取

use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    error::AppError,
    services::{AuditService, AuthService, PermissionService, ReportService, UploadService},
};

/// 应用状态
///
/// 服务之间共享审计服务与上传服务，全部以 Arc 包装
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: PgPool,
    pub jwt_service: Arc<JwtService>,
    pub auth_service: Arc<AuthService>,
    pub permission_service: Arc<PermissionService>,
    pub audit_service: Arc<AuditService>,
    pub upload_service: Arc<UploadService>,
    pub report_service: Arc<ReportService>,
}

impl AppState {
    /// 根据配置和连接池构建全部服务
    pub fn new(config: AppConfig, db: PgPool) -> Result<Self, AppError> {
        let shared_config = Arc::new(config.clone());
        let jwt_service = Arc::new(JwtService::from_config(&config)?);
        let audit_service = Arc::new(AuditService::new(db.clone()));
        let upload_service = Arc::new(UploadService::new(
            db.clone(),
            shared_config.clone(),
            audit_service.clone(),
        ));
        let auth_service = Arc::new(AuthService::new(
            db.clone(),
            jwt_service.clone(),
            audit_service.clone(),
            upload_service.clone(),
            shared_config.clone(),
        ));
        let permission_service =
            Arc::new(PermissionService::new(db.clone(), audit_service.clone()));
        let report_service = Arc::new(ReportService::new(
            db.clone(),
            shared_config,
            upload_service.clone(),
            audit_service.clone(),
        ));

        Ok(Self {
            config,
            db,
            jwt_service,
            auth_service,
            permission_service,
            audit_service,
            upload_service,
            report_service,
        })
    }
}

/// 请求来源信息，写入会话与审计日志
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_headers(headers: &HeaderMap, trust_proxy: bool) -> Self {
        Self {
            source_ip: get_client_ip(headers, trust_proxy),
            user_agent: headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string()),
        }
    }

    pub fn ip(&self) -> Option<&str> {
        self.source_ip.as_deref()
    }

    pub fn agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }
}

impl FromRequestParts<Arc<AppState>> for ClientInfo {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers, state.config.security.trust_proxy))
    }
}

tokio::task_local! {
    static REQUEST_ID: String;
}

/// 当前请求的 request_id，在请求追踪中间件之外调用时为 None
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let start = Instant::now();

        let mut response = REQUEST_ID.scope(request_id.clone(), next.run(req)).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        // 指标标签只使用有限取值
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            _ => "OTHER",
        };
        let status_class = match status {
            200..=299 => "2xx",
            300..=399 => "3xx",
            400..=499 => "4xx",
            _ => "5xx",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_class)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            path = %path,
            status = status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            headers.insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// 获取客户端 IP 地址
/// 只有在信任代理时才读取 X-Forwarded-For / X-Real-IP，且必须是合法 IP
fn get_client_ip(headers: &HeaderMap, trust_proxy: bool) -> Option<String> {
    if !trust_proxy {
        return None;
    }

    // X-Forwarded-For 可能包含多个 IP，取第一个
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    forwarded
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .and_then(|s| IpAddr::from_str(s.trim()).ok())
        .map(|ip| ip.to_string())
}
