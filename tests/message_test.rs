#[macro_use]
mod common;

use serde_json::json;

async fn send(app: &common::TestApp, from: &common::TestUser, to: i32, content: &str) -> i64 {
    let (status, body) = app
        .post(
            "/messages",
            &from.token,
            json!({ "receiver_id": to, "content": content }),
        )
        .await;
    assert_eq!(status, 200, "{}", body);
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn conversations_are_ordered_by_latest_message() {
    let app = app_or_skip!();
    let user1 = common::create_user(&app, "inbox").await;
    let user2 = common::create_user(&app, "peer_a").await;
    let user3 = common::create_user(&app, "peer_b").await;

    send(&app, &user2, user1.id, "A").await;
    send(&app, &user3, user1.id, "C").await;
    let b = send(&app, &user2, user1.id, "B").await;

    let (status, _) = app
        .put(&format!("/messages/{}/read", b), &user1.token, json!({}))
        .await;
    assert_eq!(status, 200);

    let (status, body) = app.get("/messages/conversations", Some(&user1.token)).await;
    assert_eq!(status, 200, "{}", body);
    let convs = body["data"].as_array().unwrap();
    assert_eq!(convs.len(), 2);

    assert_eq!(convs[0]["counterparty"]["id"], user2.id);
    assert_eq!(convs[0]["last_message"]["content"], "B");
    assert_eq!(convs[0]["unread_count"], 1);
    assert_eq!(convs[1]["counterparty"]["id"], user3.id);
    assert_eq!(convs[1]["last_message"]["content"], "C");
    assert_eq!(convs[1]["unread_count"], 1);

    let (_, body) = app.get("/messages/unread-count", Some(&user1.token)).await;
    assert_eq!(body["data"]["count"], 2);

    // The sender's own view counts nothing as unread
    let (_, body) = app.get("/messages/conversations", Some(&user2.token)).await;
    assert_eq!(body["data"][0]["counterparty"]["id"], user1.id);
    assert_eq!(body["data"][0]["unread_count"], 0);
}

#[tokio::test]
async fn mark_conversation_read_only_touches_that_peer() {
    let app = app_or_skip!();
    let me = common::create_user(&app, "reader").await;
    let a = common::create_user(&app, "writer_a").await;
    let b = common::create_user(&app, "writer_b").await;

    send(&app, &a, me.id, "one").await;
    send(&app, &a, me.id, "two").await;
    send(&app, &b, me.id, "three").await;
    send(&app, &me, a.id, "reply").await;

    let (status, body) = app
        .put(&format!("/messages/with/{}/read", a.id), &me.token, json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["marked"], 2);

    let (_, body) = app.get("/messages/unread-count", Some(&me.token)).await;
    assert_eq!(body["data"]["count"], 1);

    // My reply to `a` is still unread on their side
    let (_, body) = app.get("/messages/unread-count", Some(&a.token)).await;
    assert_eq!(body["data"]["count"], 1);

    let (status, body) = app
        .get(&format!("/messages/with/{}", a.id), Some(&me.token))
        .await;
    assert_eq!(status, 200);
    let thread: Vec<&str> = body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(thread, vec!["one", "two", "reply"]);
}

#[tokio::test]
async fn read_at_is_written_once_and_only_by_receiver() {
    let app = app_or_skip!();
    let sender = common::create_user(&app, "rsender").await;
    let receiver = common::create_user(&app, "rreceiver").await;
    let id = send(&app, &sender, receiver.id, "hello").await;
    let path = format!("/messages/{}/read", id);

    let (status, body) = app.put(&path, &sender.token, json!({})).await;
    assert_eq!(status, 404);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, first) = app.put(&path, &receiver.token, json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(first["data"]["is_read"], true);
    let read_at = first["data"]["read_at"].clone();
    assert!(!read_at.is_null());

    let (_, second) = app.put(&path, &receiver.token, json!({})).await;
    assert_eq!(second["data"]["read_at"], read_at);
}

#[tokio::test]
async fn send_validation() {
    let app = app_or_skip!();
    let me = common::create_user(&app, "msgval").await;
    let other = common::create_user(&app, "msgvalpeer").await;

    let (status, body) = app
        .post("/messages", &me.token, json!({ "receiver_id": me.id, "content": "hi" }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = app
        .post("/messages", &me.token, json!({ "receiver_id": other.id, "content": "   " }))
        .await;
    assert_eq!(status, 400);

    let (status, _) = app
        .post(
            "/messages",
            &me.token,
            json!({ "receiver_id": other.id, "content": "x".repeat(2001) }),
        )
        .await;
    assert_eq!(status, 400);

    let (status, _) = app
        .post("/messages", &me.token, json!({ "receiver_id": i32::MAX, "content": "hi" }))
        .await;
    assert_eq!(status, 404);

    common::set_status(&app, other.id, "banned").await;
    let (status, body) = app
        .post("/messages", &me.token, json!({ "receiver_id": other.id, "content": "hi" }))
        .await;
    assert_eq!(status, 403);
    assert_eq!(body["code"], "FORBIDDEN");
}
