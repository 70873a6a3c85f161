#[macro_use]
mod common;

use serde_json::json;

#[tokio::test]
async fn register_login_and_me() {
    let app = app_or_skip!();
    let user = common::create_user(&app, "alice").await;

    let (status, body) = common::login(&app, &user.username, "test_password_123").await;
    assert_eq!(status, 200, "{}", body);
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["user"]["status"], "active");

    let (status, body) = app.get("/auth/me", Some(&token)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["id"], user.id);
    assert_eq!(body["data"]["role"], "user");
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let app = app_or_skip!();
    let user = common::create_user(&app, "dup").await;

    let resp = app
        .client
        .post(app.url("/auth/register"))
        .json(&json!({
            "username": user.username,
            "email": "another@test.com",
            "password": "test_password_123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "ALREADY_EXISTS");
}

#[tokio::test]
async fn invalid_registration_input() {
    let app = app_or_skip!();
    let resp = app
        .client
        .post(app.url("/auth/register"))
        .json(&json!({ "username": "ab", "email": "nope", "password": "short" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = app_or_skip!();
    let user = common::create_user(&app, "wrongpw").await;

    let (status, body) = common::login(&app, &user.username, "not_the_password").await;
    assert_eq!(status, 401);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = common::login(&app, "no_such_user_here", "whatever_pw").await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn rejected_accounts_cannot_log_in() {
    let app = app_or_skip!();
    let user = common::create_user(&app, "rejected").await;
    common::set_status(&app, user.id, "rejected").await;

    let (status, body) = common::login(&app, &user.username, "test_password_123").await;
    assert_eq!(status, 403);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn change_password_requires_current_one() {
    let app = app_or_skip!();
    let user = common::create_user(&app, "pwchange").await;

    let (status, _) = app
        .put(
            "/auth/password",
            &user.token,
            json!({ "current_password": "wrong_one_123", "new_password": "brand_new_pw_1" }),
        )
        .await;
    assert_eq!(status, 400);

    let (status, _) = app
        .put(
            "/auth/password",
            &user.token,
            json!({ "current_password": "test_password_123", "new_password": "brand_new_pw_1" }),
        )
        .await;
    assert_eq!(status, 200);

    let (status, _) = common::login(&app, &user.username, "brand_new_pw_1").await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn garbage_token_on_public_route_reads_anonymously() {
    let app = app_or_skip!();
    let (status, _) = app.get("/posts", Some("not-a-jwt")).await;
    assert_eq!(status, 200);

    let (status, body) = app.get("/auth/me", Some("not-a-jwt")).await;
    assert_eq!(status, 401);
    assert_eq!(body["code"], "UNAUTHORIZED");
}
