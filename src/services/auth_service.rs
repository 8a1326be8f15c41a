//! 认证服务：注册、登录、登出、会话校验

use crate::{
    auth::{jwt::JwtService, password::PasswordHasher, AuthContext},
    config::AppConfig,
    error::AppError,
    middleware::ClientInfo,
    models::{auth::*, role::RoleName, session::Session, user::*},
    repository::{RoleRepository, SessionRepository, UserRepository},
    services::{
        audit_service::{AuditAction, AuditLogParams, AuditService},
        upload_service::UploadService,
    },
};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub struct AuthService {
    db: PgPool,
    jwt_service: Arc<JwtService>,
    audit_service: Arc<AuditService>,
    upload_service: Arc<UploadService>,
    config: Arc<AppConfig>,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(
        db: PgPool,
        jwt_service: Arc<JwtService>,
        audit_service: Arc<AuditService>,
        upload_service: Arc<UploadService>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            jwt_service,
            audit_service,
            upload_service,
            config,
            hasher: PasswordHasher::new(),
        }
    }

    /// 注册新用户，角色固定为 Viewer
    pub async fn register(
        &self,
        req: RegisterRequest,
        client: &ClientInfo,
    ) -> Result<UserResponse, AppError> {
        req.validate()?;
        PasswordHasher::validate_password_policy(&req.password, &self.config.security)?;

        let username = req.username.trim();
        let email = req.email.trim();

        let user_repo = UserRepository::new(self.db.clone());
        if user_repo.exists(username, email).await? {
            return Err(AppError::BadRequest(
                "Username or email is already registered".to_string(),
            ));
        }

        let role = RoleRepository::new(self.db.clone())
            .require(RoleName::Viewer)
            .await?;
        let password_hash = self.hasher.hash(&req.password)?;

        let user = user_repo
            .create(username, email, &password_hash, role.id)
            .await
            .map_err(|e| match e {
                // 并发注册时的唯一约束冲突
                AppError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    AppError::BadRequest("Username or email is already registered".to_string())
                }
                other => other,
            })?;

        self.audit_service
            .log_action(AuditLogParams {
                user_id: user.id,
                username: &user.username,
                action: AuditAction::UserRegister,
                details: None,
                source_ip: client.ip(),
                user_agent: client.agent(),
                success: true,
            })
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");

        Ok(UserResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            role: RoleName::Viewer,
            created_at: user.created_at,
        })
    }

    /// 用户登录，创建服务端会话
    pub async fn login(
        &self,
        req: LoginRequest,
        client: &ClientInfo,
    ) -> Result<LoginResponse, AppError> {
        req.validate()?;

        let user_repo = UserRepository::new(self.db.clone());
        let Some(user) = user_repo.find_by_username(req.username.trim()).await? else {
            tracing::warn!(username = %req.username, source_ip = ?client.source_ip, "Login failed: unknown user");
            metrics::counter!("login_failures_total").increment(1);
            return Err(AppError::Unauthorized);
        };

        if let Err(e) = self.hasher.verify(&req.password, &user.password_hash) {
            tracing::warn!(username = %user.username, source_ip = ?client.source_ip, "Login failed: wrong password");
            metrics::counter!("login_failures_total").increment(1);
            return Err(e);
        }

        self.purge_expired_sessions().await;

        let expires_at = Utc::now() + Duration::seconds(self.jwt_service.ttl_secs() as i64);
        let session = SessionRepository::new(self.db.clone())
            .create(user.id, expires_at, client.ip(), client.agent())
            .await?;

        let role = user.role();
        let access_token =
            self.jwt_service
                .generate_access_token(user.id, &user.username, role, session.id)?;

        self.audit_service
            .log_action(AuditLogParams {
                user_id: user.id,
                username: &user.username,
                action: AuditAction::UserLogin,
                details: Some(format!("session={}", session.id)),
                source_ip: client.ip(),
                user_agent: client.agent(),
                success: true,
            })
            .await?;

        tracing::info!(user_id = %user.id, session_id = %session.id, "User logged in");

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.ttl_secs(),
            user: UserResponse::from(user),
        })
    }

    /// 登出：撤销会话并删除上传的文件
    pub async fn logout(&self, ctx: &AuthContext, client: &ClientInfo) -> Result<(), AppError> {
        SessionRepository::new(self.db.clone())
            .revoke(ctx.session_id)
            .await?;
        self.upload_service.remove_session_files(ctx.session_id).await;

        self.audit_service
            .log_action(AuditLogParams {
                user_id: ctx.user_id,
                username: &ctx.username,
                action: AuditAction::UserLogout,
                details: Some(format!("session={}", ctx.session_id)),
                source_ip: client.ip(),
                user_agent: client.agent(),
                success: true,
            })
            .await?;

        tracing::info!(user_id = %ctx.user_id, session_id = %ctx.session_id, "User logged out");
        Ok(())
    }

    /// 查找有效会话（未撤销、未过期）
    pub async fn active_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Session>, AppError> {
        SessionRepository::new(self.db.clone())
            .find_active(session_id, user_id)
            .await
    }

    /// 当前用户信息
    pub async fn current_user(&self, user_id: Uuid) -> Result<UserResponse, AppError> {
        UserRepository::new(self.db.clone())
            .find_by_id(user_id)
            .await?
            .map(UserResponse::from)
            .ok_or(AppError::LoginRequired)
    }

    /// 清理过期会话及其文件，失败只记录日志
    pub async fn purge_expired_sessions(&self) {
        match SessionRepository::new(self.db.clone()).purge_expired().await {
            Ok(ids) => {
                for id in &ids {
                    self.upload_service.remove_session_files(*id).await;
                }
                if !ids.is_empty() {
                    tracing::info!(count = ids.len(), "Expired sessions purged");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to purge expired sessions"),
        }
    }
}
