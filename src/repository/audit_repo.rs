//! Audit repository (审计数据访问)

use crate::{error::AppError, models::audit::*};
use sqlx::{PgPool, Row};

pub struct AuditRepository {
    db: PgPool,
}

/// 根据过滤条件拼接 WHERE 子句，返回子句和已使用的参数个数
fn where_clause(filters: &AuditLogFilters) -> (String, usize) {
    let mut clause = String::from(" WHERE 1=1");
    let mut index = 0;

    if filters.user_id.is_some() {
        index += 1;
        clause.push_str(&format!(" AND user_id = ${}", index));
    }
    if filters.action.is_some() {
        index += 1;
        clause.push_str(&format!(" AND action = ${}", index));
    }
    if filters.start_time.is_some() {
        index += 1;
        clause.push_str(&format!(" AND occurred_at >= ${}", index));
    }
    if filters.end_time.is_some() {
        index += 1;
        clause.push_str(&format!(" AND occurred_at <= ${}", index));
    }

    (clause, index)
}

/// 按 where_clause 的顺序绑定参数
macro_rules! bind_filters {
    ($query:expr, $filters:expr) => {{
        let mut query = $query;
        if let Some(user_id) = $filters.user_id {
            query = query.bind(user_id);
        }
        if let Some(action) = &$filters.action {
            query = query.bind(action);
        }
        if let Some(start_time) = $filters.start_time {
            query = query.bind(start_time);
        }
        if let Some(end_time) = $filters.end_time {
            query = query.bind(end_time);
        }
        query
    }};
}

impl AuditRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 插入审计日志
    pub async fn insert_audit_log(&self, log: &AuditLog) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, user_id, username, action, details, source_ip, user_agent, result, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(log.id)
        .bind(log.user_id)
        .bind(&log.username)
        .bind(&log.action)
        .bind(&log.details)
        .bind(&log.source_ip)
        .bind(&log.user_agent)
        .bind(&log.result)
        .bind(log.occurred_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// 查询审计日志，按时间倒序
    pub async fn query_audit_logs(
        &self,
        filters: &AuditLogFilters,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLog>, AppError> {
        let (clause, index) = where_clause(filters);
        let query = format!(
            "SELECT * FROM audit_logs{} ORDER BY occurred_at DESC LIMIT ${} OFFSET ${}",
            clause,
            index + 1,
            index + 2
        );

        let logs = bind_filters!(sqlx::query_as::<_, AuditLog>(&query), filters)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;

        Ok(logs)
    }

    /// 统计审计日志数量
    pub async fn count_audit_logs(&self, filters: &AuditLogFilters) -> Result<i64, AppError> {
        let (clause, _) = where_clause(filters);
        let query = format!("SELECT COUNT(*) FROM audit_logs{}", clause);

        let count: i64 = bind_filters!(sqlx::query(&query), filters)
            .fetch_one(&self.db)
            .await?
            .get(0);

        Ok(count)
    }
}
