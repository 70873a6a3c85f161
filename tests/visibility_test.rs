#[macro_use]
mod common;

use serde_json::json;

#[tokio::test]
async fn anonymous_category_masks_author_for_every_viewer() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "anonadm").await;
    let author = common::create_user(&app, "anonauthor").await;
    let reader = common::create_user(&app, "anonreader").await;
    let category = common::create_category(&app, &admin, true).await;
    let post_id = common::create_post(&app, &author, category).await;

    let as_author = common::get_post(&app, post_id, Some(&author)).await["author"].clone();
    let as_reader = common::get_post(&app, post_id, Some(&reader)).await["author"].clone();
    let as_guest = common::get_post(&app, post_id, None).await["author"].clone();

    assert_eq!(as_author, as_reader);
    assert_eq!(as_reader, as_guest);
    assert_eq!(as_guest["is_anonymous"], true);
    assert!(as_guest["id"].is_null());
    assert_ne!(as_guest["username"], author.username.as_str());

    // Stored authorship is untouched
    let stored = app
        .count(&format!(
            "SELECT COUNT(*) FROM posts WHERE id = {} AND author_id = {}",
            post_id, author.id
        ))
        .await;
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn anonymous_masking_covers_lists_and_comments() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "anlstadm").await;
    let author = common::create_user(&app, "anlstauthor").await;
    let category = common::create_category(&app, &admin, true).await;
    let post_id = common::create_post(&app, &author, category).await;
    common::create_comment(&app, &author, post_id, None).await;

    let (status, body) = app
        .get(&format!("/posts?category_id={}", category), None)
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["items"][0]["author"]["is_anonymous"], true);

    let (_, body) = app.get(&format!("/posts/{}/comments", post_id), None).await;
    assert_eq!(body["data"][0]["author"]["is_anonymous"], true);
    assert!(body["data"][0]["author"]["id"].is_null());

    // Filtering by author must not reveal anonymous posts
    let (_, body) = app
        .get(&format!("/posts?author_id={}", author.id), None)
        .await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn named_category_shows_author() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "namedadm").await;
    let author = common::create_user(&app, "namedauthor").await;
    let category = common::create_category(&app, &admin, false).await;
    let post_id = common::create_post(&app, &author, category).await;

    let post = common::get_post(&app, post_id, None).await;
    assert_eq!(post["author"]["id"], author.id);
    assert_eq!(post["author"]["username"], author.username.as_str());
    assert_eq!(post["author"]["is_anonymous"], false);
}

#[tokio::test]
async fn anonymous_activity_hides_notification_actor() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "anntfadm").await;
    let author = common::create_user(&app, "anntfauthor").await;
    let commenter = common::create_user(&app, "anntfcommenter").await;
    let category = common::create_category(&app, &admin, true).await;
    let post_id = common::create_post(&app, &author, category).await;
    common::create_comment(&app, &commenter, post_id, None).await;

    let (status, body) = app.get("/notifications", Some(&author.token)).await;
    assert_eq!(status, 200);
    let item = &body["data"]["items"][0];
    assert_eq!(item["kind"], "comment_on_post");
    assert!(item["actor_id"].is_null());

    let stored = app
        .count(&format!(
            "SELECT COUNT(*) FROM notifications WHERE user_id = {} AND actor_id = {}",
            author.id, commenter.id
        ))
        .await;
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn super_admin_is_invisible_to_admins() {
    let app = app_or_skip!();
    let admin = common::create_admin(&app, "hieradm").await;
    let root = common::create_super_admin(&app, "hierroot").await;

    let (status, body) = app
        .get("/admin/users?role=super_admin", Some(&admin.token))
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["data"]["total"], 0);
    assert!(body["data"]["items"].as_array().unwrap().is_empty());

    let (status, body) = app
        .get(&format!("/admin/users/{}", root.id), Some(&admin.token))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = app
        .get(&format!("/users/{}", root.id), Some(&admin.token))
        .await;
    assert_eq!(status, 404);

    for action in ["ban", "approve", "reject"] {
        let (status, _) = app
            .put(
                &format!("/admin/users/{}/{}", root.id, action),
                &admin.token,
                json!({}),
            )
            .await;
        assert_eq!(status, 404, "{} on a super admin", action);
    }
    let (status, _) = app
        .post(
            &format!("/admin/users/{}/reset-password", root.id),
            &admin.token,
            json!({}),
        )
        .await;
    assert_eq!(status, 404);

    // User-keyed actions outside the back-office answer like a missing id
    let missing = app
        .post("/users/999999/follow", &admin.token, json!({}))
        .await;
    assert_eq!(missing.0, 404);
    let (status, body) = app
        .post(&format!("/users/{}/follow", root.id), &admin.token, json!({}))
        .await;
    assert_eq!(status, missing.0, "{}", body);
    assert_eq!(body["code"], "NOT_FOUND");
    let (status, _) = app
        .delete(&format!("/users/{}/follow", root.id), &admin.token)
        .await;
    assert_eq!(status, 404);

    let (status, body) = app
        .post(
            "/messages",
            &admin.token,
            json!({ "receiver_id": root.id, "content": "hello" }),
        )
        .await;
    assert_eq!(status, 404, "{}", body);
    let (status, _) = app
        .get(&format!("/messages/with/{}", root.id), Some(&admin.token))
        .await;
    assert_eq!(status, 404);
    let rows = app
        .count(&format!(
            "SELECT (SELECT COUNT(*) FROM follows WHERE following_id = {0}) \
             + (SELECT COUNT(*) FROM messages WHERE receiver_id = {0})",
            root.id
        ))
        .await;
    assert_eq!(rows, 0);

    // Super admins see everyone
    let (status, body) = app
        .get(&format!("/admin/users/{}", root.id), Some(&root.token))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["role"], "super_admin");

    // Regular users see the public profile
    let user = common::create_user(&app, "hieruser").await;
    let (status, _) = app
        .get(&format!("/users/{}", root.id), Some(&user.token))
        .await;
    assert_eq!(status, 200);
    let (status, body) = app
        .post(&format!("/users/{}/follow", root.id), &user.token, json!({}))
        .await;
    assert_eq!(status, 200, "{}", body);
}

#[tokio::test]
async fn private_resources_stay_with_their_owner() {
    let app = app_or_skip!();
    let owner = common::create_user(&app, "resowner").await;
    let other = common::create_user(&app, "resother").await;

    let (status, body) = app
        .post(
            "/resources",
            &owner.token,
            json!({ "title": "notes", "file_url": "https://files.example/notes.pdf", "is_public": false }),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    let private_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .post(
            "/resources",
            &owner.token,
            json!({ "title": "slides", "file_url": "https://files.example/slides.pdf" }),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    let public_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["is_public"], true);

    let listing = format!("/resources?owner_id={}", owner.id);
    let (_, body) = app.get(&listing, Some(&other.token)).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["id"], public_id);

    let (_, body) = app.get(&listing, None).await;
    assert_eq!(body["data"]["total"], 1);

    let (_, body) = app.get(&listing, Some(&owner.token)).await;
    assert_eq!(body["data"]["total"], 2);

    let (status, _) = app
        .get(&format!("/resources/{}", private_id), Some(&other.token))
        .await;
    assert_eq!(status, 404);
    let (status, _) = app
        .post(
            &format!("/resources/{}/download", private_id),
            &other.token,
            json!({}),
        )
        .await;
    assert_eq!(status, 404);
    let (status, _) = app
        .delete(&format!("/resources/{}", private_id), &other.token)
        .await;
    assert_eq!(status, 404);

    let (status, body) = app
        .post(
            &format!("/resources/{}/download", private_id),
            &owner.token,
            json!({}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["download_count"], 1);
    assert_eq!(body["data"]["file_url"], "https://files.example/notes.pdf");
}
