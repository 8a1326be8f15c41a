//! Session repository (会话数据访问)

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{error::AppError, models::session::Session};

pub struct SessionRepository {
    db: PgPool,
}

impl SessionRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 创建会话
    pub async fn create(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
        source_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<Session, AppError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, expires_at, source_ip, user_agent)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(expires_at)
        .bind(source_ip)
        .bind(user_agent)
        .fetch_one(&self.db)
        .await?;

        Ok(session)
    }

    /// 查找未撤销且未过期的会话
    pub async fn find_active(&self, id: Uuid, user_id: Uuid) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions
            WHERE id = $1 AND user_id = $2 AND revoked_at IS NULL AND expires_at > NOW()
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(session)
    }

    /// 撤销会话
    pub async fn revoke(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = NOW(), report_cache = NULL WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 清除缓存的报表
    pub async fn clear_report(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE sessions SET report_cache = NULL, report_generated_at = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// 记录文件上传，同时清除旧报表
    pub async fn mark_files_uploaded(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE sessions
            SET files_uploaded_at = $2, report_cache = NULL, report_generated_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// 缓存报表
    pub async fn store_report(
        &self,
        id: Uuid,
        report: &serde_json::Value,
        generated_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE sessions SET report_cache = $2, report_generated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(report)
            .bind(generated_at)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// 删除过期或已撤销的会话，返回被删除的会话 ID
    pub async fn purge_expired(&self) -> Result<Vec<Uuid>, AppError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            DELETE FROM sessions
            WHERE expires_at <= NOW() OR revoked_at IS NOT NULL
            RETURNING id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(ids)
    }
}
