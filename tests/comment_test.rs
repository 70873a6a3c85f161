#[macro_use]
mod common;

use serde_json::json;

#[tokio::test]
async fn locked_post_rejects_comments() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "lockadm").await;
    let author = common::create_user(&app, "lockauthor").await;
    let category = common::create_category(&app, &admin, false).await;
    let post_id = common::create_post(&app, &author, category).await;

    let (status, body) = app
        .put(&format!("/posts/{}/lock", post_id), &admin.token, json!({}))
        .await;
    assert_eq!(status, 200, "{}", body);

    let (status, body) = app
        .post(
            &format!("/posts/{}/comments", post_id),
            &author.token,
            json!({ "content": "too late" }),
        )
        .await;
    assert_eq!(status, 403);
    assert_eq!(body["code"], "FORBIDDEN");
    assert_eq!(common::get_post(&app, post_id, None).await["comment_count"], 0);
}

#[tokio::test]
async fn parent_must_belong_to_the_same_post() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "parentadm").await;
    let author = common::create_user(&app, "parentauthor").await;
    let category = common::create_category(&app, &admin, false).await;
    let first = common::create_post(&app, &author, category).await;
    let second = common::create_post(&app, &author, category).await;
    let foreign = common::create_comment(&app, &author, first, None).await;

    let (status, body) = app
        .post(
            &format!("/posts/{}/comments", second),
            &author.token,
            json!({ "parent_id": foreign, "content": "wrong thread" }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn only_the_author_edits_a_comment() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "editadm").await;
    let author = common::create_user(&app, "editauthor").await;
    let other = common::create_user(&app, "editother").await;
    let category = common::create_category(&app, &admin, false).await;
    let post_id = common::create_post(&app, &author, category).await;
    let comment_id = common::create_comment(&app, &author, post_id, None).await;
    let path = format!("/comments/{}", comment_id);

    let (status, body) = app.put(&path, &other.token, json!({ "content": "hijack" })).await;
    assert_eq!(status, 403);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = app.put(&path, &author.token, json!({ "content": "edited" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["content"], "edited");
}

#[tokio::test]
async fn reply_notifies_parent_and_post_authors() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "rnadm").await;
    let op = common::create_user(&app, "rnop").await;
    let commenter = common::create_user(&app, "rncommenter").await;
    let replier = common::create_user(&app, "rnreplier").await;
    let category = common::create_category(&app, &admin, false).await;
    let post_id = common::create_post(&app, &op, category).await;
    let parent = common::create_comment(&app, &commenter, post_id, None).await;
    common::create_comment(&app, &replier, post_id, Some(parent)).await;

    let (_, body) = app.get("/notifications", Some(&commenter.token)).await;
    let kinds: Vec<&str> = body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["reply_to_comment"]);

    let (_, body) = app.get("/notifications/unread-count", Some(&op.token)).await;
    assert_eq!(body["data"]["count"], 2);

    let (status, body) = app.put("/notifications/read-all", &op.token, json!({})).await;
    assert_eq!(status, 200, "{}", body);
    let (_, body) = app.get("/notifications/unread-count", Some(&op.token)).await;
    assert_eq!(body["data"]["count"], 0);
}

#[tokio::test]
async fn notifications_belong_to_their_recipient() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "nrcadm").await;
    let op = common::create_user(&app, "nrcop").await;
    let commenter = common::create_user(&app, "nrccommenter").await;
    let category = common::create_category(&app, &admin, false).await;
    let post_id = common::create_post(&app, &op, category).await;
    common::create_comment(&app, &commenter, post_id, None).await;

    let (_, body) = app.get("/notifications", Some(&op.token)).await;
    let id = body["data"]["items"][0]["id"].as_i64().unwrap();
    let path = format!("/notifications/{}/read", id);

    let (status, _) = app.put(&path, &commenter.token, json!({})).await;
    assert_eq!(status, 404);

    let (status, first) = app.put(&path, &op.token, json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(first["data"]["is_read"], true);
    let (_, second) = app.put(&path, &op.token, json!({})).await;
    assert_eq!(second["data"]["read_at"], first["data"]["read_at"]);
}
