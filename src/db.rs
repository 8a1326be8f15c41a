//! PostgreSQL 连接池、内嵌迁移与就绪检查
//! 报表服务依赖 roles / users / sessions / audit_logs 四张表，角色由迁移预置

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::{migrate::Migrator, postgres::PgPoolOptions, PgPool};

use crate::{config::DatabaseConfig, models::role::RoleName};

/// 编译期内嵌的迁移脚本
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// 按配置构造连接池参数
fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .test_before_acquire(true)
}

/// 建立连接池，启动时即连接一次
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    let pool = pool_options(config)
        .connect(config.url.expose_secret())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Cannot reach report database");
            DbError::ConnectionFailed(e.to_string())
        })?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Report database connected"
    );

    Ok(pool)
}

/// 执行内嵌迁移，已执行的版本会被跳过
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    let latest = MIGRATOR.iter().map(|m| m.version).max().unwrap_or_default();

    MIGRATOR.run(pool).await.map_err(|e| {
        tracing::error!(error = %e, "Schema migration failed");
        DbError::MigrationFailed(e.to_string())
    })?;

    tracing::info!(migrations = MIGRATOR.iter().count(), latest, "Schema up to date");
    Ok(())
}

/// 数据库就绪状态
#[derive(Debug, Clone, PartialEq)]
pub enum DbReadiness {
    Ready,
    /// 迁移未预置的角色
    MissingRoles(Vec<&'static str>),
    Unreachable(String),
}

impl DbReadiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, DbReadiness::Ready)
    }

    pub fn message(&self) -> Option<String> {
        match self {
            DbReadiness::Ready => None,
            DbReadiness::MissingRoles(roles) => Some(format!("Missing roles: {}", roles.join(", "))),
            DbReadiness::Unreachable(e) => Some(e.clone()),
        }
    }
}

/// 找出 `seeded` 中缺少的固定角色
fn missing_roles(seeded: &[String]) -> Vec<&'static str> {
    RoleName::ALL
        .iter()
        .map(RoleName::as_str)
        .filter(|name| !seeded.iter().any(|s| s.as_str() == *name))
        .collect()
}

/// 检查数据库可达且三个固定角色都已存在
pub async fn readiness(pool: &PgPool) -> DbReadiness {
    record_pool_metrics(pool);

    let seeded: Vec<String> = match sqlx::query_scalar::<_, String>("SELECT name FROM roles")
        .fetch_all(pool)
        .await
    {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(error = %e, "Report database not ready");
            return DbReadiness::Unreachable(e.to_string());
        }
    };

    let missing = missing_roles(&seeded);
    if missing.is_empty() {
        DbReadiness::Ready
    } else {
        tracing::warn!(missing = ?missing, "Role seed data incomplete");
        DbReadiness::MissingRoles(missing)
    }
}

fn record_pool_metrics(pool: &PgPool) {
    metrics::gauge!("db.pool.size").set(pool.size() as f64);
    metrics::gauge!("db.pool.idle").set(pool.num_idle() as f64);
}

/// 数据库错误类型
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}
