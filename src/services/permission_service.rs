//! 权限检查服务
//! 角色以数据库中的当前值为准，令牌中的角色仅供展示

use crate::{
    auth::AuthContext,
    error::AppError,
    middleware::ClientInfo,
    models::{role::RoleName, user::UserResponse},
    repository::{RoleRepository, UserRepository},
    services::audit_service::{AuditAction, AuditLogParams, AuditService},
};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub struct PermissionService {
    db: PgPool,
    audit_service: Arc<AuditService>,
}

impl PermissionService {
    pub fn new(db: PgPool, audit_service: Arc<AuditService>) -> Self {
        Self { db, audit_service }
    }

    /// 用户当前角色
    pub async fn current_role(&self, user_id: Uuid) -> Result<RoleName, AppError> {
        let user = UserRepository::new(self.db.clone())
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::LoginRequired)?;

        Ok(user.role())
    }

    /// 检查角色，如果不满足则返回 403
    pub async fn require_role(&self, user_id: Uuid, required: RoleName) -> Result<RoleName, AppError> {
        let role = self.current_role(user_id).await?;

        if !role.includes(required) {
            tracing::warn!(
                user_id = %user_id,
                role = %role,
                required = %required,
                "Permission denied"
            );
            return Err(AppError::Forbidden);
        }

        Ok(role)
    }

    /// 列出所有用户
    pub async fn list_users(&self) -> Result<Vec<UserResponse>, AppError> {
        let users = UserRepository::new(self.db.clone()).list().await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    /// Owner 修改其他用户的角色
    pub async fn change_role(
        &self,
        actor: &AuthContext,
        target_id: Uuid,
        role: RoleName,
        client: &ClientInfo,
    ) -> Result<UserResponse, AppError> {
        self.require_role(actor.user_id, RoleName::Owner).await?;

        if target_id == actor.user_id {
            return Err(AppError::BadRequest("Owners cannot change their own role".to_string()));
        }

        let user_repo = UserRepository::new(self.db.clone());
        let target = user_repo
            .find_by_id(target_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        let previous = target.role();

        self.assign(target_id, role).await?;

        self.audit_service
            .log_action(AuditLogParams {
                user_id: actor.user_id,
                username: &actor.username,
                action: AuditAction::UserRoleChange,
                details: Some(format!("{}: {} -> {}", target.username, previous, role)),
                source_ip: client.ip(),
                user_agent: client.agent(),
                success: true,
            })
            .await?;

        tracing::info!(target = %target.username, from = %previous, to = %role, "Role changed");

        self.updated_user(target_id).await
    }

    /// 按用户名设置角色（命令行使用，无操作者）
    pub async fn assign_role_by_username(
        &self,
        username: &str,
        role: RoleName,
    ) -> Result<UserResponse, AppError> {
        let target = UserRepository::new(self.db.clone())
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        let previous = target.role();

        self.assign(target.id, role).await?;

        self.audit_service
            .log_action(AuditLogParams {
                user_id: target.id,
                username: &target.username,
                action: AuditAction::UserRoleChange,
                details: Some(format!("{}: {} -> {} (command line)", target.username, previous, role)),
                source_ip: None,
                user_agent: None,
                success: true,
            })
            .await?;

        self.updated_user(target.id).await
    }

    async fn assign(&self, user_id: Uuid, role: RoleName) -> Result<(), AppError> {
        let role = RoleRepository::new(self.db.clone()).require(role).await?;
        let updated = UserRepository::new(self.db.clone())
            .update_role(user_id, role.id)
            .await?;

        if !updated {
            return Err(AppError::not_found("User not found"));
        }
        Ok(())
    }

    async fn updated_user(&self, user_id: Uuid) -> Result<UserResponse, AppError> {
        UserRepository::new(self.db.clone())
            .find_by_id(user_id)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| AppError::not_found("User not found"))
    }
}
