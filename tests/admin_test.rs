#[macro_use]
mod common;

use serde_json::{json, Value};
use std::time::Duration;

/// Audit entries are written on a background task.
async fn wait_for_audit(app: &common::TestApp, token: &str, action: &str, target_id: i32) -> Value {
    for _ in 0..50 {
        let (status, body) = app
            .get(&format!("/admin/audit-logs?action={}&per_page=100", action), Some(token))
            .await;
        assert_eq!(status, 200, "{}", body);
        if let Some(entry) = body["data"]["items"]
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["target_id"] == target_id)
        {
            return entry.clone();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("no '{}' audit entry for target {}", action, target_id);
}

#[tokio::test]
async fn plain_users_are_kept_out() {
    let app = app_or_skip!();
    let user = common::create_user(&app, "nosy").await;

    let (status, body) = app.get("/admin/stats", Some(&user.token)).await;
    assert_eq!(status, 403);
    assert_eq!(body["code"], "FORBIDDEN");
    let (status, _) = app.get("/admin/users", Some(&user.token)).await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn ban_blocks_login_and_existing_tokens() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "banadm").await;
    let target = common::create_user(&app, "bantarget").await;

    let (status, body) = app
        .put(&format!("/admin/users/{}/ban", target.id), &admin.token, json!({}))
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["status"], "banned");

    let (status, body) = app.get("/auth/me", Some(&target.token)).await;
    assert_eq!(status, 403);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = common::login(&app, &target.username, "test_password_123").await;
    assert_eq!(status, 403);

    // Banning twice is an invalid transition
    let (status, body) = app
        .put(&format!("/admin/users/{}/ban", target.id), &admin.token, json!({}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let entry = wait_for_audit(&app, &admin.token, "ban_user", target.id).await;
    assert_eq!(entry["admin_id"], admin.id);

    let (status, body) = app
        .put(&format!("/admin/users/{}/unban", target.id), &admin.token, json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "active");
    let (status, _) = app.get("/auth/me", Some(&target.token)).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn admins_cannot_act_on_themselves_or_peers() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "peeradm").await;
    let peer = common::create_admin(&app, "peerpeer").await;

    let (status, body) = app
        .put(&format!("/admin/users/{}/ban", admin.id), &admin.token, json!({}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = app
        .put(&format!("/admin/users/{}/ban", peer.id), &admin.token, json!({}))
        .await;
    assert_eq!(status, 403);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn only_super_admin_changes_roles() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "roleadm").await;
    let root = common::create_super_admin(&app, "roleroot").await;
    let user = common::create_user(&app, "roleuser").await;
    let path = format!("/admin/users/{}/role", user.id);

    let (status, _) = app.put(&path, &admin.token, json!({ "role": "admin" })).await;
    assert_eq!(status, 403);

    let (status, body) = app.put(&path, &root.token, json!({ "role": "wizard" })).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = app.put(&path, &root.token, json!({ "role": "admin" })).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["role"], "admin");

    // The new role applies to the next request
    let (status, _) = app.get("/admin/stats", Some(&user.token)).await;
    assert_eq!(status, 200);

    let (status, _) = app
        .put(
            &format!("/admin/users/{}/role", root.id),
            &root.token,
            json!({ "role": "user" }),
        )
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn review_flow_approves_pending_accounts() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "revadm").await;
    let applicant = common::create_user(&app, "applicant").await;
    common::set_status(&app, applicant.id, "pending").await;

    let (status, body) = common::login(&app, &applicant.username, "test_password_123").await;
    assert_eq!(status, 403);
    assert!(body["message"].as_str().unwrap().contains("review"));

    let (status, body) = app
        .get("/admin/users?status=pending", Some(&admin.token))
        .await;
    assert_eq!(status, 200);
    assert!(body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .any(|u| u["id"] == applicant.id));

    let (status, _) = app
        .put(
            &format!("/admin/users/{}/approve", applicant.id),
            &admin.token,
            json!({}),
        )
        .await;
    assert_eq!(status, 200);

    let (status, body) = common::login(&app, &applicant.username, "test_password_123").await;
    assert_eq!(status, 200, "{}", body);
}

#[tokio::test]
async fn reset_password_issues_working_temporary_password() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "rstpwadm").await;
    let user = common::create_user(&app, "forgetful").await;

    let (status, body) = app
        .post(
            &format!("/admin/users/{}/reset-password", user.id),
            &admin.token,
            json!({}),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    let temporary = body["data"]["temporary_password"].as_str().unwrap().to_string();

    let (status, body) = common::login(&app, &user.username, &temporary).await;
    assert_eq!(status, 200, "{}", body);
}

#[tokio::test]
async fn category_with_posts_cannot_be_deleted() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "catadm").await;
    let author = common::create_user(&app, "catauthor").await;
    let used = common::create_category(&app, &admin, false).await;
    let empty = common::create_category(&app, &admin, false).await;
    common::create_post(&app, &author, used).await;

    let (status, body) = app
        .delete(&format!("/admin/categories/{}", used), &admin.token)
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = app
        .delete(&format!("/admin/categories/{}", empty), &admin.token)
        .await;
    assert_eq!(status, 200);
    let (status, _) = app.get(&format!("/categories/{}", empty), None).await;
    assert_eq!(status, 404);

    let (status, _) = app
        .delete(&format!("/admin/categories/{}", used), &author.token)
        .await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn stats_reflect_content() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "statadm").await;
    let author = common::create_user(&app, "statauthor").await;
    let category = common::create_category(&app, &admin, false).await;
    common::create_post(&app, &author, category).await;

    let (status, body) = app.get("/admin/stats", Some(&admin.token)).await;
    assert_eq!(status, 200, "{}", body);
    assert!(body["data"]["total_users"].as_u64().unwrap() >= 2);
    assert!(body["data"]["total_posts"].as_u64().unwrap() >= 1);
    assert!(body["data"]["posts_today"].as_u64().unwrap() >= 1);
}
