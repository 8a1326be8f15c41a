//! 报表服务：在阻塞线程上运行处理流程，并把结果缓存到会话

use std::sync::Arc;
use std::time::Instant;

use sqlx::PgPool;

use crate::{
    auth::AuthContext,
    config::AppConfig,
    error::AppError,
    middleware::ClientInfo,
    models::{
        report::{GenerateReportRequest, ReportView},
        session::Session,
    },
    processing::{self, build_charts, DateRange, ReportInputs, ReportOptions},
    repository::SessionRepository,
    services::{
        audit_service::{AuditAction, AuditLogParams, AuditService},
        upload_service::UploadService,
    },
};

/// 解析可选的日期区间；两个日期必须同时提供或同时省略
pub fn parse_date_range(req: &GenerateReportRequest) -> Result<Option<DateRange>, AppError> {
    let start = req.start_date.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let end = req.end_date.as_deref().map(str::trim).filter(|s| !s.is_empty());

    match (start, end) {
        (Some(start), Some(end)) => Ok(Some(DateRange::parse(start, end)?)),
        (None, None) => Ok(None),
        _ => Err(AppError::BadRequest(
            "Both start_date and end_date are required for date filtering".to_string(),
        )),
    }
}

pub struct ReportService {
    db: PgPool,
    config: Arc<AppConfig>,
    upload_service: Arc<UploadService>,
    audit_service: Arc<AuditService>,
}

impl ReportService {
    pub fn new(
        db: PgPool,
        config: Arc<AppConfig>,
        upload_service: Arc<UploadService>,
        audit_service: Arc<AuditService>,
    ) -> Self {
        Self {
            db,
            config,
            upload_service,
            audit_service,
        }
    }

    async fn session(&self, ctx: &AuthContext) -> Result<Session, AppError> {
        SessionRepository::new(self.db.clone())
            .find_active(ctx.session_id, ctx.user_id)
            .await?
            .ok_or(AppError::LoginRequired)
    }

    /// 生成报表并缓存到会话
    pub async fn generate(
        &self,
        ctx: &AuthContext,
        req: GenerateReportRequest,
        client: &ClientInfo,
    ) -> Result<ReportView, AppError> {
        let session = self.session(ctx).await?;
        if !session.has_files() {
            return Err(AppError::BadRequest(
                "Please upload the report files first.".to_string(),
            ));
        }

        let started = Instant::now();
        let result = self.build_view(&session, &req).await;

        let details = match &result {
            Ok(view) => format!(
                "tables={}, date_range={}",
                view.tables.len(),
                view.date_range.as_deref().unwrap_or("all")
            ),
            Err(e) => e.user_message(),
        };

        self.audit_service
            .log_action(AuditLogParams {
                user_id: ctx.user_id,
                username: &ctx.username,
                action: AuditAction::ReportGenerate,
                details: Some(details),
                source_ip: client.ip(),
                user_agent: client.agent(),
                success: result.is_ok(),
            })
            .await?;

        let view = result?;

        let cached = serde_json::to_value(&view)
            .map_err(|e| AppError::Internal(format!("Failed to serialize report: {}", e)))?;
        SessionRepository::new(self.db.clone())
            .store_report(session.id, &cached, view.generated_at)
            .await?;

        let elapsed = started.elapsed();
        metrics::counter!("reports_generated_total").increment(1);
        metrics::histogram!("report_generation_duration_seconds").record(elapsed.as_secs_f64());
        tracing::info!(
            session_id = %session.id,
            elapsed_ms = elapsed.as_millis() as u64,
            "Report generated"
        );

        Ok(view)
    }

    async fn build_view(
        &self,
        session: &Session,
        req: &GenerateReportRequest,
    ) -> Result<ReportView, AppError> {
        let date_range = parse_date_range(req)?;
        let files = self.upload_service.load(session.id).await?;
        let options = ReportOptions::from_config(&self.config.reports, date_range);

        // 处理流程是 CPU 密集型，放到阻塞线程
        let (output, charts) = tokio::task::spawn_blocking(move || {
            let inputs = ReportInputs {
                deals: &files.deals,
                excluded: &files.excluded,
                vip: &files.vip,
            };
            let output = processing::run(inputs, &options)?;
            let charts = build_charts(&output);
            Ok::<_, processing::ProcessingError>((output, charts))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Report task failed: {}", e)))??;

        Ok(ReportView::new(session.id, &output, charts))
    }

    /// 会话中最近一次生成的报表
    pub async fn latest(&self, ctx: &AuthContext) -> Result<ReportView, AppError> {
        let session = self.session(ctx).await?;
        let cached = session
            .report_cache
            .ok_or_else(|| AppError::not_found("No report has been generated yet"))?;

        serde_json::from_value(cached)
            .map_err(|e| AppError::Internal(format!("Cached report is unreadable: {}", e)))
    }
}
