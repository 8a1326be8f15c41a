//! Report request and view models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserResponse;
use crate::processing::{Chart, ReportOutput, ReportTable};

/// Optional date filter for a report run. Both bounds or neither.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateReportRequest {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Rendered report, cached on the session as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportView {
    pub session_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub date_range: Option<String>,
    pub vip_volume: f64,
    pub lot_size: f64,
    pub tables: Vec<ReportTable>,
    pub charts: Vec<Chart>,
}

impl ReportView {
    pub fn new(session_id: Uuid, output: &ReportOutput, charts: Vec<Chart>) -> Self {
        Self {
            session_id,
            generated_at: Utc::now(),
            date_range: output.date_range.as_ref().map(|r| r.label.clone()),
            vip_volume: output.vip_volume,
            lot_size: output.lot_size,
            tables: output.tables(),
            charts,
        }
    }
}

/// Upload result
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub session_id: Uuid,
    pub uploaded_at: DateTime<Utc>,
    pub files: Vec<UploadedFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub field: String,
    pub filename: String,
    pub bytes: usize,
}

/// Dashboard summary for the current session
#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub user: UserResponse,
    pub session_id: Uuid,
    pub files_uploaded_at: Option<DateTime<Utc>>,
    pub report_generated_at: Option<DateTime<Utc>>,
    pub can_view_users: bool,
    pub can_view_audit_logs: bool,
}
