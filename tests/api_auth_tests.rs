//! 认证与权限 API 集成测试

use axum::http::{header, StatusCode};
use deal_reports::{auth::JwtService, models::role::RoleName};
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;

mod common;
use common::{
    count_audit, create_test_app, create_test_app_state, get_request, json_request, lazy_pool,
    login, promote, register_user, send, setup_test_db, TEST_PASSWORD,
};

// ==================== 无需数据库 ====================

#[tokio::test]
async fn test_missing_token_redirects_to_login() {
    let config = common::create_test_config();
    let pool = lazy_pool(&config);
    let app = create_test_app(create_test_app_state(config, pool));

    let response = tower::ServiceExt::oneshot(app, get_request("/api/v1/dashboard", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/api/v1/auth/login");

    let (_, json) = common::read_json(response).await;
    assert_eq!(json["error"]["code"], 401);
    assert!(json["error"]["request_id"].is_string());
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let config = common::create_test_config();
    let pool = lazy_pool(&config);
    let app = create_test_app(create_test_app_state(config, pool));

    for uri in ["/api/v1/auth/me", "/api/v1/admin/audit-logs", "/api/v1/reports/latest"] {
        let (status, _) = send(&app, get_request(uri, Some("not-a-jwt"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_token_signed_with_other_secret_rejected() {
    let config = common::create_test_config();
    let pool = lazy_pool(&config);
    let app = create_test_app(create_test_app_state(config, pool));

    let foreign = JwtService::new(
        &secrecy::Secret::new("another-secret-key-that-is-long-enough-32".to_string()),
        300,
    )
    .unwrap();
    let token = foreign
        .generate_access_token(Uuid::new_v4(), "mallory", RoleName::Owner, Uuid::new_v4())
        .unwrap();

    let (status, _) = send(&app, get_request("/api/v1/admin/users", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ==================== 需要数据库 ====================

#[tokio::test]
#[serial]
#[ignore] // 需要数据库
async fn test_register_login_and_me() {
    let config = common::create_test_config();
    let pool = setup_test_db(&config).await;
    let app = create_test_app(create_test_app_state(config, pool.clone()));

    let user = register_user(&app, "alice").await;
    assert_eq!(user["role"], "Viewer");
    assert!(user.get("password_hash").is_none());

    let token = login(&app, "alice").await;
    let (status, me) = send(&app, get_request("/api/v1/auth/me", Some(&token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");
    assert_eq!(me["email"], "alice@example.com");
    assert_eq!(count_audit(&pool, "alice", "user.register").await, 1);
    assert_eq!(count_audit(&pool, "alice", "user.login").await, 1);
}

#[tokio::test]
#[serial]
#[ignore] // 需要数据库
async fn test_register_rejects_duplicates_and_weak_passwords() {
    let config = common::create_test_config();
    let pool = setup_test_db(&config).await;
    let app = create_test_app(create_test_app_state(config, pool));

    register_user(&app, "bob").await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/v1/auth/register",
            None,
            json!({"username": "bob", "email": "other@example.com", "password": TEST_PASSWORD}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/v1/auth/register",
            None,
            json!({"username": "carol", "email": "carol@example.com", "password": "short"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
#[ignore] // 需要数据库
async fn test_login_failures_are_unauthorized() {
    let config = common::create_test_config();
    let pool = setup_test_db(&config).await;
    let app = create_test_app(create_test_app_state(config, pool.clone()));

    register_user(&app, "dave").await;

    for body in [
        json!({"username": "dave", "password": "WrongPass123"}),
        json!({"username": "nobody", "password": TEST_PASSWORD}),
    ] {
        let (status, json) =
            send(&app, json_request("POST", "/api/v1/auth/login", None, body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["message"], "Invalid username or password");
    }

    // 失败的登录不写审计
    assert_eq!(count_audit(&pool, "dave", "user.login").await, 0);
}

#[tokio::test]
#[serial]
#[ignore] // 需要数据库
async fn test_logout_revokes_session() {
    let config = common::create_test_config();
    let pool = setup_test_db(&config).await;
    let app = create_test_app(create_test_app_state(config, pool.clone()));

    register_user(&app, "erin").await;
    let token = login(&app, "erin").await;

    let (status, _) =
        send(&app, json_request("POST", "/api/v1/auth/logout", Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get_request("/api/v1/dashboard", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(count_audit(&pool, "erin", "user.logout").await, 1);
}

#[tokio::test]
#[serial]
#[ignore] // 需要数据库
async fn test_viewer_denied_audit_logs_owner_granted() {
    let config = common::create_test_config();
    let pool = setup_test_db(&config).await;
    let state = create_test_app_state(config, pool);
    let app = create_test_app(state.clone());

    register_user(&app, "viewer").await;
    register_user(&app, "owner").await;
    promote(&state, "owner", RoleName::Owner).await;

    let viewer_token = login(&app, "viewer").await;
    let owner_token = login(&app, "owner").await;

    let (status, _) =
        send(&app, get_request("/api/v1/admin/audit-logs", Some(&viewer_token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, page) =
        send(&app, get_request("/api/v1/admin/audit-logs?limit=10", Some(&owner_token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["limit"], 10);
    assert!(page["total"].as_i64().unwrap() >= 4);

    let (status, page) = send(
        &app,
        get_request("/api/v1/admin/audit-logs?action=user.login", Some(&owner_token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = page["items"].as_array().unwrap();
    assert!(items.iter().all(|item| item["action"] == "user.login"));
}

#[tokio::test]
#[serial]
#[ignore] // 需要数据库
async fn test_user_list_requires_admin() {
    let config = common::create_test_config();
    let pool = setup_test_db(&config).await;
    let state = create_test_app_state(config, pool);
    let app = create_test_app(state.clone());

    register_user(&app, "frank").await;
    register_user(&app, "grace").await;
    promote(&state, "grace", RoleName::Admin).await;

    let frank = login(&app, "frank").await;
    let grace = login(&app, "grace").await;

    let (status, _) = send(&app, get_request("/api/v1/admin/users", Some(&frank))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, users) = send(&app, get_request("/api/v1/admin/users", Some(&grace))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);

    // Admin 不能查看审计日志
    let (status, _) = send(&app, get_request("/api/v1/admin/audit-logs", Some(&grace))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
#[ignore] // 需要数据库
async fn test_owner_changes_roles() {
    let config = common::create_test_config();
    let pool = setup_test_db(&config).await;
    let state = create_test_app_state(config, pool.clone());
    let app = create_test_app(state.clone());

    let owner = register_user(&app, "heidi").await;
    let target = register_user(&app, "ivan").await;
    promote(&state, "heidi", RoleName::Owner).await;

    let owner_token = login(&app, "heidi").await;
    let ivan_token = login(&app, "ivan").await;

    let target_uri = format!("/api/v1/admin/users/{}/role", target["id"].as_str().unwrap());
    let (status, updated) = send(
        &app,
        json_request("PUT", &target_uri, Some(&owner_token), json!({"role": "Admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["role"], "Admin");
    // 命令行提升 + 本次修改
    assert_eq!(count_audit(&pool, "heidi", "user.role_change").await, 2);

    // 新角色立即生效
    let (status, _) = send(&app, get_request("/api/v1/admin/users", Some(&ivan_token))).await;
    assert_eq!(status, StatusCode::OK);

    // 非 Owner 不能修改角色
    let owner_uri = format!("/api/v1/admin/users/{}/role", owner["id"].as_str().unwrap());
    let (status, _) = send(
        &app,
        json_request("PUT", &owner_uri, Some(&ivan_token), json!({"role": "Viewer"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Owner 不能修改自己的角色
    let (status, _) = send(
        &app,
        json_request("PUT", &owner_uri, Some(&owner_token), json!({"role": "Viewer"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
