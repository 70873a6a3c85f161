#[macro_use]
mod common;

use serde_json::json;

#[tokio::test]
async fn follow_and_unfollow() {
    let app = app_or_skip!();
    let fan = common::create_user(&app, "follower").await;
    let star = common::create_user(&app, "star").await;
    let path = format!("/users/{}/follow", star.id);

    let (status, body) = app.post(&path, &fan.token, json!({})).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["is_following"], true);
    assert_eq!(body["data"]["follower_count"], 1);

    let (status, body) = app.post(&path, &fan.token, json!({})).await;
    assert_eq!(status, 409);
    assert_eq!(body["code"], "ALREADY_ACTIVE");

    let (_, body) = app
        .get(&format!("/users/{}/followers", star.id), None)
        .await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["id"], fan.id);

    let (_, body) = app
        .get(&format!("/users/{}/following", fan.id), None)
        .await;
    assert_eq!(body["data"]["items"][0]["id"], star.id);

    let (_, body) = app
        .get(&format!("/users/{}", star.id), Some(&fan.token))
        .await;
    assert_eq!(body["data"]["follower_count"], 1);
    assert_eq!(body["data"]["is_following"], true);

    let (_, body) = app.get("/notifications", Some(&star.token)).await;
    assert_eq!(body["data"]["items"][0]["kind"], "follow");
    assert_eq!(body["data"]["items"][0]["actor_id"], fan.id);

    let (status, body) = app.delete(&path, &fan.token).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["is_following"], false);
    assert_eq!(body["data"]["follower_count"], 0);

    let (status, body) = app.delete(&path, &fan.token).await;
    assert_eq!(status, 409);
    assert_eq!(body["code"], "NOT_ACTIVE");
}

#[tokio::test]
async fn self_follow_is_rejected() {
    let app = app_or_skip!();
    let user = common::create_user(&app, "narcissus").await;

    let (status, body) = app
        .post(&format!("/users/{}/follow", user.id), &user.token, json!({}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn cannot_follow_inactive_or_missing_users() {
    let app = app_or_skip!();
    let fan = common::create_user(&app, "inactfan").await;
    let gone = common::create_user(&app, "inactgone").await;
    common::set_status(&app, gone.id, "banned").await;

    let (status, body) = app
        .post(&format!("/users/{}/follow", gone.id), &fan.token, json!({}))
        .await;
    assert_eq!(status, 403);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = app
        .post(&format!("/users/{}/follow", i32::MAX), &fan.token, json!({}))
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn admin_does_not_see_super_admin_followers() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "flwadm").await;
    let root = common::create_super_admin(&app, "flwroot").await;
    let star = common::create_user(&app, "flwstar").await;

    let path = format!("/users/{}/follow", star.id);
    let (status, _) = app.post(&path, &root.token, json!({})).await;
    assert_eq!(status, 200);

    let followers = format!("/users/{}/followers", star.id);
    let (_, body) = app.get(&followers, Some(&admin.token)).await;
    assert_eq!(body["data"]["total"], 0);
    let (_, body) = app.get(&followers, Some(&star.token)).await;
    assert_eq!(body["data"]["total"], 1);
}
