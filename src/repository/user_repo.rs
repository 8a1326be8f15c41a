//! User repository (数据库访问层)

use crate::{error::AppError, models::user::*};
use sqlx::PgPool;
use uuid::Uuid;

const USER_WITH_ROLE: &str = r#"
    SELECT u.id, u.username, u.email, u.password_hash, r.name AS role_name,
           r.level AS role_level, u.created_at
    FROM users u
    JOIN roles r ON r.id = u.role_id
"#;

pub struct UserRepository {
    db: PgPool,
}

impl UserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 根据用户名查找用户（含角色）
    pub async fn find_by_username(&self, username: &str) -> Result<Option<UserWithRole>, AppError> {
        let user = sqlx::query_as::<_, UserWithRole>(&format!("{} WHERE u.username = $1", USER_WITH_ROLE))
            .bind(username)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// 根据 ID 查找用户（含角色）
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UserWithRole>, AppError> {
        let user = sqlx::query_as::<_, UserWithRole>(&format!("{} WHERE u.id = $1", USER_WITH_ROLE))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// 用户名或邮箱是否已被占用
    pub async fn exists(&self, username: &str, email: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 OR lower(email) = lower($2))",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.db)
        .await?;

        Ok(exists)
    }

    /// 创建用户
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role_id: Uuid,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, role_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role_id)
        .fetch_one(&self.db)
        .await?;

        Ok(user)
    }

    /// 列出所有用户
    pub async fn list(&self) -> Result<Vec<UserWithRole>, AppError> {
        let users = sqlx::query_as::<_, UserWithRole>(&format!("{} ORDER BY u.created_at", USER_WITH_ROLE))
            .fetch_all(&self.db)
            .await?;

        Ok(users)
    }

    /// 修改用户角色
    pub async fn update_role(&self, id: Uuid, role_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET role_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(role_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
