//! 文件上传处理器

use crate::{
    auth::AuthContext,
    error::AppError,
    middleware::{AppState, ClientInfo},
    services::{IncomingFile, UploadKind},
};
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("The upload exceeds the size limit".to_string())
    } else {
        AppError::BadRequest(format!("Invalid multipart upload: {}", e.body_text()))
    }
}

/// 上传 deals_csv、ex_csv、vip_csv 三个文件
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    client: ClientInfo,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut files = Vec::with_capacity(3);

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(kind) = field.name().and_then(UploadKind::from_field) else {
            tracing::debug!(field = ?field.name(), "Ignoring unknown multipart field");
            continue;
        };
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;

        files.push(IncomingFile {
            kind,
            filename,
            bytes: bytes.to_vec(),
        });
    }

    let response = state
        .upload_service
        .store(&auth_context, files, &client)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}
