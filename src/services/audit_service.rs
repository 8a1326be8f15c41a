//! 审计日志服务

use crate::{error::AppError, models::audit::*, repository::audit_repo::AuditRepository};
use sqlx::PgPool;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

/// 审计操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    UserRegister,
    UserLogin,
    UserLogout,
    UserRoleChange,
    FilesUpload,
    ReportGenerate,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserRegister => "user.register",
            AuditAction::UserLogin => "user.login",
            AuditAction::UserLogout => "user.logout",
            AuditAction::UserRoleChange => "user.role_change",
            AuditAction::FilesUpload => "files.upload",
            AuditAction::ReportGenerate => "report.generate",
        }
    }
}

/// 审计日志参数结构体
#[derive(Debug, Clone)]
pub struct AuditLogParams<'a> {
    pub user_id: Uuid,
    pub username: &'a str,
    pub action: AuditAction,
    pub details: Option<String>,
    pub source_ip: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub success: bool,
}

pub struct AuditService {
    db: PgPool,
}

impl AuditService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 记录审计日志条目
    pub async fn log_action(&self, params: AuditLogParams<'_>) -> Result<(), AppError> {
        let log = AuditLog {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            username: params.username.to_string(),
            action: params.action.as_str().to_string(),
            details: params.details,
            source_ip: params.source_ip.map(|s| s.to_string()),
            user_agent: params.user_agent.map(|s| s.to_string()),
            result: if params.success { "success" } else { "failure" }.to_string(),
            occurred_at: chrono::Utc::now(),
        };

        let repo = AuditRepository::new(self.db.clone());
        repo.insert_audit_log(&log).await?;

        tracing::info!(
            user_id = %log.user_id,
            action = %log.action,
            result = %log.result,
            "Audit log recorded"
        );

        Ok(())
    }

    /// 分页查询审计日志
    pub async fn query_logs(&self, filters: &AuditLogFilters) -> Result<AuditLogPage, AppError> {
        let (limit, offset) = page_bounds(filters.limit, filters.offset);
        let repo = AuditRepository::new(self.db.clone());

        let items = repo.query_audit_logs(filters, limit, offset).await?;
        let total = repo.count_audit_logs(filters).await?;

        Ok(AuditLogPage {
            items,
            total,
            limit,
            offset,
        })
    }
}

fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}
