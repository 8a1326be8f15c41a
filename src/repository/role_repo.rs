//! Role repository (角色数据访问)

use crate::{error::AppError, models::role::*};
use sqlx::PgPool;

pub struct RoleRepository {
    db: PgPool,
}

impl RoleRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 列出所有角色，按级别排序
    pub async fn list(&self) -> Result<Vec<Role>, AppError> {
        let roles = sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY level")
            .fetch_all(&self.db)
            .await?;

        Ok(roles)
    }

    /// 根据名称查找角色
    pub async fn find_by_name(&self, name: RoleName) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE name = $1")
            .bind(name.as_str())
            .fetch_optional(&self.db)
            .await?;

        Ok(role)
    }

    /// 查找必须存在的种子角色
    pub async fn require(&self, name: RoleName) -> Result<Role, AppError> {
        self.find_by_name(name)
            .await?
            .ok_or_else(|| AppError::internal_error(&format!("Role {} is not seeded", name)))
    }
}
