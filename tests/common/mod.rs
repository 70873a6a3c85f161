#![allow(dead_code)]

use reqwest::Client;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Once;
use tokio::sync::OnceCell;

static INIT: Once = Once::new();
static SCHEMA_READY: OnceCell<()> = OnceCell::const_new();

fn init_env() {
    INIT.call_once(|| {
        dotenv::dotenv().ok();
        std::env::set_var(
            "JWT_SECRET",
            "integration_test_secret_that_is_at_least_32_characters_long",
        );
        // Concurrency tests fire bursts from a single address
        std::env::set_var("RATE_LIMIT_ENABLED", "false");
        std::env::set_var("REQUIRE_REGISTRATION_REVIEW", "false");
        let config = campus_forum::config::jwt::JwtConfig::from_env().unwrap();
        let _ = campus_forum::utils::jwt::init_jwt_config(config);
    });
}

fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}

pub struct TestApp {
    pub addr: String,
    pub db: DatabaseConnection,
    pub client: Client,
}

/// A registered account.
pub struct TestUser {
    pub id: i32,
    pub username: String,
    pub token: String,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.addr, path)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (u16, Value) {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        into_parts(req.send().await.unwrap()).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        into_parts(resp).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        into_parts(resp).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> (u16, Value) {
        let resp = self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        into_parts(resp).await
    }

    /// Run a scalar `SELECT COUNT(*)` style query.
    pub async fn count(&self, sql: &str) -> i64 {
        let row = self
            .db
            .query_one(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                sql.to_string(),
            ))
            .await
            .unwrap()
            .unwrap();
        row.try_get_by_index::<i64>(0).unwrap()
    }

    pub async fn exec(&self, sql: &str) {
        self.db
            .execute(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                sql.to_string(),
            ))
            .await
            .unwrap();
    }
}

async fn into_parts(resp: reqwest::Response) -> (u16, Value) {
    let status = resp.status().as_u16();
    let body = resp.json().await.unwrap_or(Value::Null);
    (status, body)
}

/// Start the API on a random port. Returns `None` when no database is
/// configured so the suite can run on machines without Postgres.
pub async fn spawn_app() -> Option<TestApp> {
    init_env();

    let Some(database_url) = database_url() else {
        eprintln!("skipping: TEST_DATABASE_URL / DATABASE_URL not set");
        return None;
    };

    let db = sea_orm::Database::connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    // Once per test binary; tests inside a binary run concurrently and only
    // ever touch rows they created.
    SCHEMA_READY
        .get_or_init(|| async {
            campus_forum::migration::Migrator::up(&db, None)
                .await
                .expect("Failed to run migrations");
            cleanup_tables(&db).await;
        })
        .await;

    let hub = campus_forum::websocket::hub::PushHub::new();

    let app = axum::Router::new()
        .route("/", axum::routing::get(|| async { "ok" }))
        .merge(campus_forum::routes::create_routes())
        .layer(axum::middleware::from_fn(
            campus_forum::middleware::security::security_headers_middleware,
        ))
        .layer(axum::extract::Extension(db.clone()))
        .layer(axum::extract::Extension(hub));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    Some(TestApp {
        addr: format!("http://{}", addr),
        db,
        client: Client::new(),
    })
}

async fn cleanup_tables(db: &DatabaseConnection) {
    let tables = [
        "admin_logs",
        "notifications",
        "messages",
        "resources",
        "follows",
        "favorites",
        "likes",
        "comments",
        "posts",
        "categories",
        "users",
    ];

    for table in tables {
        let sql = format!("TRUNCATE TABLE {} CASCADE", table);
        let _ = db
            .execute(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                sql,
            ))
            .await;
    }
}

fn unique_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..10].to_string()
}

/// Register a fresh active user.
pub async fn create_user(app: &TestApp, prefix: &str) -> TestUser {
    let username = format!("{}_{}", prefix, unique_suffix());
    let resp = app
        .client
        .post(app.url("/auth/register"))
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{}@test.com", username),
            "password": "test_password_123"
        }))
        .send()
        .await
        .expect("Failed to register user");

    let status = resp.status();
    let body: Value = resp.json().await.unwrap();
    if !body["success"].as_bool().unwrap_or(false) {
        panic!("Failed to register '{}': status={}, body={}", username, status, body);
    }

    TestUser {
        id: body["data"]["user"]["id"].as_i64().unwrap() as i32,
        token: body["data"]["token"].as_str().unwrap().to_string(),
        username,
    }
}

/// Set a role directly. Tokens stay valid because the role is re-read per request.
pub async fn set_role(app: &TestApp, user_id: i32, role: &str) {
    app.db
        .execute(Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            "UPDATE users SET role = $1 WHERE id = $2",
            vec![role.into(), user_id.into()],
        ))
        .await
        .expect("Failed to update role");
}

pub async fn set_status(app: &TestApp, user_id: i32, status: &str) {
    app.db
        .execute(Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            "UPDATE users SET status = $1 WHERE id = $2",
            vec![status.into(), user_id.into()],
        ))
        .await
        .expect("Failed to update status");
}

pub async fn create_admin(app: &TestApp, prefix: &str) -> TestUser {
    let user = create_user(app, prefix).await;
    set_role(app, user.id, "admin").await;
    user
}

pub async fn create_super_admin(app: &TestApp, prefix: &str) -> TestUser {
    let user = create_user(app, prefix).await;
    set_role(app, user.id, "super_admin").await;
    user
}

/// Create a category through the admin API and return its id.
pub async fn create_category(app: &TestApp, admin: &TestUser, is_anonymous: bool) -> i32 {
    let (status, body) = app
        .post(
            "/admin/categories",
            &admin.token,
            serde_json::json!({
                "name": format!("cat_{}", unique_suffix()),
                "description": "test category",
                "is_anonymous": is_anonymous,
            }),
        )
        .await;
    assert_eq!(status, 200, "create category failed: {}", body);
    body["data"]["id"].as_i64().unwrap() as i32
}

pub async fn create_post(app: &TestApp, author: &TestUser, category_id: i32) -> i32 {
    let (status, body) = app
        .post(
            "/posts",
            &author.token,
            serde_json::json!({
                "category_id": category_id,
                "title": "Test post",
                "content": "Some **markdown** content",
            }),
        )
        .await;
    assert_eq!(status, 200, "create post failed: {}", body);
    body["data"]["id"].as_i64().unwrap() as i32
}

pub async fn create_comment(
    app: &TestApp,
    author: &TestUser,
    post_id: i32,
    parent_id: Option<i32>,
) -> i32 {
    let (status, body) = app
        .post(
            &format!("/posts/{}/comments", post_id),
            &author.token,
            serde_json::json!({ "parent_id": parent_id, "content": "a comment" }),
        )
        .await;
    assert_eq!(status, 200, "create comment failed: {}", body);
    body["data"]["id"].as_i64().unwrap() as i32
}

/// Fetch a post as `viewer` (or anonymously).
pub async fn get_post(app: &TestApp, post_id: i32, viewer: Option<&TestUser>) -> Value {
    let (status, body) = app
        .get(&format!("/posts/{}", post_id), viewer.map(|u| u.token.as_str()))
        .await;
    assert_eq!(status, 200, "get post failed: {}", body);
    body["data"].clone()
}

/// Spawn the app or return early from the test when no database is configured.
#[allow(unused_macros)]
macro_rules! app_or_skip {
    () => {
        match common::spawn_app().await {
            Some(app) => app,
            None => return,
        }
    };
}

pub async fn login(app: &TestApp, username: &str, password: &str) -> (u16, Value) {
    let resp = app
        .client
        .post(app.url("/auth/login"))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap();
    into_parts(resp).await
}
