//! Role domain models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role row as stored in `roles`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub level: i32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The three fixed roles. A higher level includes every permission of a lower one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleName {
    Viewer,
    Admin,
    Owner,
}

impl RoleName {
    pub const ALL: [RoleName; 3] = [RoleName::Viewer, RoleName::Admin, RoleName::Owner];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Viewer => "Viewer",
            RoleName::Admin => "Admin",
            RoleName::Owner => "Owner",
        }
    }

    pub fn level(&self) -> i32 {
        match self {
            RoleName::Viewer => 10,
            RoleName::Admin => 20,
            RoleName::Owner => 30,
        }
    }

    /// Whether this role may do what `required` may do
    pub fn includes(&self, required: RoleName) -> bool {
        self.level() >= required.level()
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "viewer" => Ok(RoleName::Viewer),
            "admin" => Ok(RoleName::Admin),
            "owner" => Ok(RoleName::Owner),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Change role request
#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: RoleName,
}
