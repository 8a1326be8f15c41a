//! 报表处理器

use crate::{
    auth::AuthContext,
    error::AppError,
    middleware::{AppState, ClientInfo},
    models::report::GenerateReportRequest,
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// 生成报表，可选 start_date / end_date 查询参数
pub async fn generate_report(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    client: ClientInfo,
    Query(req): Query<GenerateReportRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = state
        .report_service
        .generate(&auth_context, req, &client)
        .await?;
    Ok(Json(view))
}

/// 最近一次生成的报表
pub async fn latest_report(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let view = state.report_service.latest(&auth_context).await?;
    Ok(Json(view))
}
