//! 管理端处理器：用户列表、角色分配、审计日志

use crate::{
    auth::AuthContext,
    error::AppError,
    middleware::{AppState, ClientInfo},
    models::{
        audit::AuditLogFilters,
        role::{RoleName, UpdateRoleRequest},
    },
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

/// 用户列表（Admin 及以上）
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .require_role(auth_context.user_id, RoleName::Admin)
        .await?;

    let users = state.permission_service.list_users().await?;
    Ok(Json(users))
}

/// 修改用户角色（仅 Owner）
pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    client: ClientInfo,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .permission_service
        .change_role(&auth_context, id, req.role, &client)
        .await?;
    Ok(Json(user))
}

/// 查询审计日志（仅 Owner）
pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Query(filters): Query<AuditLogFilters>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .require_role(auth_context.user_id, RoleName::Owner)
        .await?;

    let page = state.audit_service.query_logs(&filters).await?;
    Ok(Json(page))
}
