//! Server-side login session

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Session row. Holds the upload state and the cached report of one login.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub files_uploaded_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub report_cache: Option<serde_json::Value>,
    pub report_generated_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }

    pub fn has_files(&self) -> bool {
        self.files_uploaded_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_in: i64, revoked: bool) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            created_at: now,
            expires_at: now + Duration::seconds(expires_in),
            revoked_at: revoked.then_some(now),
            source_ip: None,
            user_agent: None,
            files_uploaded_at: None,
            report_cache: None,
            report_generated_at: None,
        }
    }

    #[test]
    fn test_session_activity() {
        let now = Utc::now();
        assert!(session(60, false).is_active(now));
        assert!(!session(60, true).is_active(now));
        assert!(!session(-60, false).is_active(now));
    }
}
