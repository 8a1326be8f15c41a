//! Business logic services layer

pub mod audit_service;
pub mod auth_service;
pub mod permission_service;
pub mod report_service;
pub mod upload_service;

pub use audit_service::{AuditAction, AuditLogParams, AuditService};
pub use auth_service::AuthService;
pub use permission_service::PermissionService;
pub use report_service::ReportService;
pub use upload_service::{IncomingFile, UploadKind, UploadService};
