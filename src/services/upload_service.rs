//! 上传服务：校验并保存每个会话的三个 CSV 文件

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::AuthContext,
    config::AppConfig,
    error::AppError,
    middleware::ClientInfo,
    models::report::{UploadResponse, UploadedFile},
    processing::reader::{read_login_set, read_table},
    repository::SessionRepository,
    services::audit_service::{AuditAction, AuditLogParams, AuditService},
};

/// 生成报表所需的三个文件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Deals,
    Excluded,
    Vip,
}

impl UploadKind {
    pub const ALL: [UploadKind; 3] = [UploadKind::Deals, UploadKind::Excluded, UploadKind::Vip];

    /// multipart 字段名
    pub fn field_name(&self) -> &'static str {
        match self {
            UploadKind::Deals => "deals_csv",
            UploadKind::Excluded => "ex_csv",
            UploadKind::Vip => "vip_csv",
        }
    }

    pub fn from_field(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.field_name() == name)
    }

    /// 会话目录中保存的文件名
    pub fn stored_name(&self) -> &'static str {
        match self {
            UploadKind::Deals => "deals.csv",
            UploadKind::Excluded => "excluded.csv",
            UploadKind::Vip => "vip.csv",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UploadKind::Deals => "deals",
            UploadKind::Excluded => "excluded accounts",
            UploadKind::Vip => "VIP clients",
        }
    }
}

/// 收到的单个上传文件
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub kind: UploadKind,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// 会话已保存的文件
#[derive(Debug, Clone)]
pub struct StoredFiles {
    pub deals: Vec<u8>,
    pub excluded: Vec<u8>,
    pub vip: Vec<u8>,
}

/// 校验单个文件：扩展名、大小、内容可按 CSV 解析
pub fn validate_file(file: &IncomingFile, max_bytes: usize) -> Result<(), AppError> {
    let label = file.kind.label();

    if file.filename.trim().is_empty() {
        return Err(AppError::BadRequest(format!("No {} file selected", label)));
    }

    let is_csv = Path::new(file.filename.trim())
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(AppError::UnsupportedUpload(format!(
            "The {} file must be a .csv file",
            label
        )));
    }

    if file.bytes.is_empty() {
        return Err(AppError::BadRequest(format!("The {} file is empty", label)));
    }

    if file.bytes.len() > max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "The {} file exceeds the {} byte limit",
            label, max_bytes
        )));
    }

    // 二进制文件（xlsx、图片等）含有 NUL 字节
    if file.bytes.contains(&0) {
        return Err(AppError::UnsupportedUpload(format!(
            "The {} file is not a text CSV file",
            label
        )));
    }

    match file.kind {
        UploadKind::Deals => {
            read_table(&file.bytes, label)?;
        }
        UploadKind::Excluded | UploadKind::Vip => {
            read_login_set(&file.bytes, label)?;
        }
    }

    Ok(())
}

/// 按类型排好顺序，缺少任一文件即报错
pub fn collect_files(files: Vec<IncomingFile>) -> Result<[IncomingFile; 3], AppError> {
    let mut slots: [Option<IncomingFile>; 3] = [None, None, None];

    for file in files {
        let index = UploadKind::ALL
            .iter()
            .position(|k| *k == file.kind)
            .unwrap_or_default();
        slots[index] = Some(file);
    }

    let [deals, excluded, vip] = slots;
    match (deals, excluded, vip) {
        (Some(d), Some(e), Some(v)) => Ok([d, e, v]),
        (d, e, _) => {
            let missing = if d.is_none() {
                UploadKind::Deals
            } else if e.is_none() {
                UploadKind::Excluded
            } else {
                UploadKind::Vip
            };
            Err(AppError::BadRequest(format!(
                "Missing file field '{}'. All three files are required.",
                missing.field_name()
            )))
        }
    }
}

pub struct UploadService {
    db: PgPool,
    config: Arc<AppConfig>,
    audit_service: Arc<AuditService>,
}

impl UploadService {
    pub fn new(db: PgPool, config: Arc<AppConfig>, audit_service: Arc<AuditService>) -> Self {
        Self {
            db,
            config,
            audit_service,
        }
    }

    pub fn session_dir(&self, session_id: Uuid) -> PathBuf {
        Path::new(&self.config.uploads.dir).join(session_id.to_string())
    }

    /// 上传目录可写时返回 Ok
    pub async fn check_storage(&self) -> std::io::Result<()> {
        check_writable(Path::new(&self.config.uploads.dir)).await
    }

    /// 校验并保存上传文件，替换会话中之前的文件和报表
    pub async fn store(
        &self,
        ctx: &AuthContext,
        files: Vec<IncomingFile>,
        client: &ClientInfo,
    ) -> Result<UploadResponse, AppError> {
        let result = self.replace_files(ctx.session_id, files).await;

        let (success, details) = match &result {
            Ok((stored, _)) => (
                true,
                stored
                    .iter()
                    .map(|f| format!("{}={} ({} bytes)", f.field, f.filename, f.bytes))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            Err(e) => (false, e.user_message()),
        };

        // 审计在文件和会话状态更新之后写入
        self.audit_service
            .log_action(AuditLogParams {
                user_id: ctx.user_id,
                username: &ctx.username,
                action: AuditAction::FilesUpload,
                details: Some(details),
                source_ip: client.ip(),
                user_agent: client.agent(),
                success,
            })
            .await?;

        let (files, uploaded_at) = result?;

        metrics::counter!("uploads_total").increment(1);
        tracing::info!(session_id = %ctx.session_id, user = %ctx.username, "Report files uploaded");

        Ok(UploadResponse {
            session_id: ctx.session_id,
            uploaded_at,
            files,
        })
    }

    /// 校验后替换会话文件
    ///
    /// 写盘前先清除缓存报表，写完后再记录上传时间
    async fn replace_files(
        &self,
        session_id: Uuid,
        files: Vec<IncomingFile>,
    ) -> Result<(Vec<UploadedFile>, DateTime<Utc>), AppError> {
        let files = collect_files(files)?;
        for file in &files {
            validate_file(file, self.config.uploads.max_file_bytes)?;
        }

        let sessions = SessionRepository::new(self.db.clone());
        sessions.clear_report(session_id).await?;

        let dir = self.session_dir(session_id);
        tokio::fs::create_dir_all(&dir).await?;

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            tokio::fs::write(dir.join(file.kind.stored_name()), &file.bytes).await?;
            stored.push(UploadedFile {
                field: file.kind.field_name().to_string(),
                filename: file.filename,
                bytes: file.bytes.len(),
            });
        }

        let uploaded_at = Utc::now();
        sessions.mark_files_uploaded(session_id, uploaded_at).await?;

        Ok((stored, uploaded_at))
    }

    /// 读取会话已保存的文件
    pub async fn load(&self, session_id: Uuid) -> Result<StoredFiles, AppError> {
        let dir = self.session_dir(session_id);
        let read = |kind: UploadKind| {
            let path = dir.join(kind.stored_name());
            async move {
                tokio::fs::read(&path).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        AppError::BadRequest("Please upload the report files first.".to_string())
                    } else {
                        AppError::from(e)
                    }
                })
            }
        };

        Ok(StoredFiles {
            deals: read(UploadKind::Deals).await?,
            excluded: read(UploadKind::Excluded).await?,
            vip: read(UploadKind::Vip).await?,
        })
    }

    /// 删除会话目录（不存在时忽略）
    pub async fn remove_session_files(&self, session_id: Uuid) {
        let dir = self.session_dir(session_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => tracing::debug!(session_id = %session_id, "Session files removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(session_id = %session_id, error = %e, "Failed to remove session files"),
        }
    }
}

/// 在目录中写入并删除一个临时文件
async fn check_writable(dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let marker = dir.join(format!(".write-check-{}", Uuid::new_v4()));
    tokio::fs::write(&marker, b"ok").await?;
    tokio::fs::remove_file(&marker).await
}
