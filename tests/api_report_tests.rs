//! 上传与报表 API 集成测试（需要数据库）

use axum::http::StatusCode;
use serde_json::json;
use serial_test::serial;

mod common;
use common::{
    count_audit, create_test_app, create_test_app_state, get_request, json_request, login,
    register_user, report_files, send, setup_test_db, upload_request,
};

fn generate_request(token: &str, query: &str) -> axum::http::Request<axum::body::Body> {
    json_request(
        "POST",
        &format!("/api/v1/reports/generate{}", query),
        Some(token),
        json!({}),
    )
}

#[tokio::test]
#[serial]
#[ignore] // 需要数据库
async fn test_upload_then_generate_report() {
    let config = common::create_test_config();
    let pool = setup_test_db(&config).await;
    let app = create_test_app(create_test_app_state(config, pool.clone()));

    register_user(&app, "trader").await;
    let token = login(&app, "trader").await;

    let (status, uploaded) = send(&app, upload_request(&token, &report_files())).await;
    assert_eq!(status, StatusCode::CREATED, "{}", uploaded);
    assert_eq!(uploaded["files"].as_array().unwrap().len(), 3);

    let (status, report) = send(&app, generate_request(&token, "")).await;
    assert_eq!(status, StatusCode::OK, "{}", report);

    let names: Vec<&str> = report["tables"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 9);
    assert_eq!(names.last(), Some(&"Final Calculations"));
    assert_eq!(report["vip_volume"], 200000.0);
    assert!(!report["charts"].as_array().unwrap().is_empty());

    // 缓存的报表与生成结果一致
    let (status, latest) = send(&app, get_request("/api/v1/reports/latest", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest, report);

    let (_, dashboard) = send(&app, get_request("/api/v1/dashboard", Some(&token))).await;
    assert!(dashboard["files_uploaded_at"].is_string());
    assert!(dashboard["report_generated_at"].is_string());
    assert_eq!(dashboard["can_view_audit_logs"], false);

    assert_eq!(count_audit(&pool, "trader", "files.upload").await, 1);
    assert_eq!(count_audit(&pool, "trader", "report.generate").await, 1);
}

#[tokio::test]
#[serial]
#[ignore] // 需要数据库
async fn test_generate_with_date_range() {
    let config = common::create_test_config();
    let pool = setup_test_db(&config).await;
    let app = create_test_app(create_test_app_state(config, pool));

    register_user(&app, "ranger").await;
    let token = login(&app, "ranger").await;
    send(&app, upload_request(&token, &report_files())).await;

    let (status, report) = send(
        &app,
        generate_request(&token, "?start_date=2024-01-01&end_date=2024-01-31"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["date_range"], "From 2024-01-01 to 2024-01-31");

    let (status, _) = send(&app, generate_request(&token, "?start_date=2024-01-01")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
#[ignore] // 需要数据库
async fn test_reupload_replaces_cached_report() {
    let config = common::create_test_config();
    let pool = setup_test_db(&config).await;
    let app = create_test_app(create_test_app_state(config, pool.clone()));

    register_user(&app, "repeat").await;
    let token = login(&app, "repeat").await;
    send(&app, upload_request(&token, &report_files())).await;
    let (status, _) = send(&app, generate_request(&token, "")).await;
    assert_eq!(status, StatusCode::OK);

    // 校验失败的上传不影响已有报表
    let bad: Vec<(&str, &str, &[u8])> = vec![
        ("deals_csv", "deals.xlsx", b"PK\x03\x04"),
        ("ex_csv", "excluded.csv", b"9999\n"),
        ("vip_csv", "vip.csv", b"1001\n"),
    ];
    let (status, _) = send(&app, upload_request(&token, &bad)).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let (status, _) = send(&app, get_request("/api/v1/reports/latest", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, upload_request(&token, &report_files())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, get_request("/api/v1/reports/latest", Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, dashboard) = send(&app, get_request("/api/v1/dashboard", Some(&token))).await;
    assert!(dashboard["files_uploaded_at"].is_string());
    assert!(dashboard["report_generated_at"].is_null());
    assert_eq!(count_audit(&pool, "repeat", "files.upload").await, 3);
}

#[tokio::test]
#[serial]
#[ignore] // 需要数据库
async fn test_generate_requires_upload() {
    let config = common::create_test_config();
    let pool = setup_test_db(&config).await;
    let app = create_test_app(create_test_app_state(config, pool));

    register_user(&app, "early").await;
    let token = login(&app, "early").await;

    let (status, json) = send(&app, generate_request(&token, "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "Please upload the report files first.");

    let (status, _) = send(&app, get_request("/api/v1/reports/latest", Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
#[ignore] // 需要数据库
async fn test_non_csv_upload_rejected() {
    let config = common::create_test_config();
    let pool = setup_test_db(&config).await;
    let app = create_test_app(create_test_app_state(config, pool.clone()));

    register_user(&app, "sloppy").await;
    let token = login(&app, "sloppy").await;

    let files: Vec<(&str, &str, &[u8])> = vec![
        ("deals_csv", "deals.xlsx", b"PK\x03\x04"),
        ("ex_csv", "excluded.csv", b"9999\n"),
        ("vip_csv", "vip.csv", b"1001\n"),
    ];
    let (status, _) = send(&app, upload_request(&token, &files)).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    // 失败也只记一条审计
    assert_eq!(count_audit(&pool, "sloppy", "files.upload").await, 1);

    let (_, dashboard) = send(&app, get_request("/api/v1/dashboard", Some(&token))).await;
    assert!(dashboard["files_uploaded_at"].is_null());
}

#[tokio::test]
#[serial]
#[ignore] // 需要数据库
async fn test_upload_requires_all_files() {
    let config = common::create_test_config();
    let pool = setup_test_db(&config).await;
    let app = create_test_app(create_test_app_state(config, pool));

    register_user(&app, "partial").await;
    let token = login(&app, "partial").await;

    let files = report_files().into_iter().take(2).collect::<Vec<_>>();
    let (status, json) = send(&app, upload_request(&token, &files)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"].as_str().unwrap().contains("vip_csv"));
}

#[tokio::test]
#[serial]
#[ignore] // 需要数据库
async fn test_missing_column_is_unprocessable() {
    let config = common::create_test_config();
    let pool = setup_test_db(&config).await;
    let app = create_test_app(create_test_app_state(config, pool.clone()));

    register_user(&app, "broken").await;
    let token = login(&app, "broken").await;

    let files: Vec<(&str, &str, &[u8])> = vec![
        ("deals_csv", "deals.csv", b"Deal,Login\n1,1001\n"),
        ("ex_csv", "excluded.csv", b"9999\n"),
        ("vip_csv", "vip.csv", b"1001\n"),
    ];
    let (status, _) = send(&app, upload_request(&token, &files)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(&app, generate_request(&token, "")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Processing rule"));

    let failures: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM audit_logs WHERE username = 'broken' AND action = 'report.generate' AND result = 'failure'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(failures, 1);
}

#[tokio::test]
#[serial]
#[ignore] // 需要数据库
async fn test_same_files_same_tables_across_sessions() {
    let config = common::create_test_config();
    let pool = setup_test_db(&config).await;
    let app = create_test_app(create_test_app_state(config, pool));

    register_user(&app, "first").await;
    register_user(&app, "second").await;

    let mut reports = Vec::new();
    for username in ["first", "second"] {
        let token = login(&app, username).await;
        let (status, _) = send(&app, upload_request(&token, &report_files())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, report) = send(&app, generate_request(&token, "")).await;
        assert_eq!(status, StatusCode::OK);
        reports.push(report);
    }

    assert_ne!(reports[0]["session_id"], reports[1]["session_id"]);
    assert_eq!(reports[0]["tables"], reports[1]["tables"]);
    assert_eq!(reports[0]["charts"], reports[1]["charts"]);
}
