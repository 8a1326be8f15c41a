//! 仪表盘处理器

use crate::{
    auth::AuthContext,
    error::AppError,
    middleware::AppState,
    models::{report::DashboardResponse, role::RoleName},
};
use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

/// 当前会话的上传与报表状态
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth_service.current_user(auth_context.user_id).await?;
    let session = state
        .auth_service
        .active_session(auth_context.session_id, auth_context.user_id)
        .await?
        .ok_or(AppError::LoginRequired)?;

    Ok(Json(DashboardResponse {
        can_view_users: user.role.includes(RoleName::Admin),
        can_view_audit_logs: user.role.includes(RoleName::Owner),
        user,
        session_id: session.id,
        files_uploaded_at: session.files_uploaded_at,
        report_generated_at: session.report_generated_at,
    }))
}
