mod config;
mod error;
mod handlers;
mod middleware;
mod migration;
mod models;
mod response;
mod routes;
mod services;
mod utils;
mod websocket;

use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use serde_json::json;
use services::cache::CacheService;
use std::env;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;
use websocket::hub::PushHub;

#[derive(OpenApi)]
#[openapi(
    modifiers(&JwtSecurity),
    paths(
        health_check,
        // Auth routes
        crate::handlers::register,
        crate::handlers::login,
        crate::handlers::get_current_user,
        crate::handlers::change_password,
        // User routes
        crate::handlers::user::get_user_profile,
        crate::handlers::user::update_profile,
        // Category routes
        crate::handlers::category::list_categories,
        crate::handlers::category::get_category,
        crate::handlers::category::create_category,
        crate::handlers::category::update_category,
        crate::handlers::category::delete_category,
        // Post routes
        crate::handlers::post::list_posts,
        crate::handlers::post::get_post,
        crate::handlers::post::create_post,
        crate::handlers::post::update_post,
        crate::handlers::post::delete_post,
        crate::handlers::post::restore_post,
        crate::handlers::post::pin_post,
        crate::handlers::post::lock_post,
        // Comment routes
        crate::handlers::comment::list_comments,
        crate::handlers::comment::create_comment,
        crate::handlers::comment::update_comment,
        crate::handlers::comment::delete_comment,
        crate::handlers::comment::restore_comment,
        // Interaction routes
        crate::handlers::interaction::like_post,
        crate::handlers::interaction::unlike_post,
        crate::handlers::interaction::like_comment,
        crate::handlers::interaction::unlike_comment,
        crate::handlers::interaction::favorite_post,
        crate::handlers::interaction::unfavorite_post,
        crate::handlers::interaction::list_favorites,
        // Follow routes
        crate::handlers::follow::follow_user,
        crate::handlers::follow::unfollow_user,
        crate::handlers::follow::list_followers,
        crate::handlers::follow::list_following,
        // Message routes
        crate::handlers::message::send_message,
        crate::handlers::message::list_conversations,
        crate::handlers::message::list_messages,
        crate::handlers::message::mark_conversation_read,
        crate::handlers::message::mark_message_read,
        crate::handlers::message::unread_total,
        // Notification routes
        crate::handlers::notification::list_notifications,
        crate::handlers::notification::unread_count,
        crate::handlers::notification::mark_all_read,
        crate::handlers::notification::mark_read,
        // Resource routes
        crate::handlers::resource::list_resources,
        crate::handlers::resource::get_resource,
        crate::handlers::resource::download_resource,
        crate::handlers::resource::create_resource,
        crate::handlers::resource::update_resource,
        crate::handlers::resource::delete_resource,
        // Admin routes
        crate::handlers::admin::get_stats,
        crate::handlers::admin::list_users,
        crate::handlers::admin::get_user,
        crate::handlers::admin::update_user,
        crate::handlers::admin::ban_user,
        crate::handlers::admin::unban_user,
        crate::handlers::admin::approve_user,
        crate::handlers::admin::reject_user,
        crate::handlers::admin::reset_password,
        crate::handlers::admin::update_user_role,
        crate::handlers::admin::hard_delete_post,
        crate::handlers::admin::hard_delete_comment,
        crate::handlers::admin::admin_restore_post,
        crate::handlers::admin::admin_restore_comment,
        crate::handlers::admin::reconcile_counters,
        crate::handlers::admin::list_audit_logs,
    ),
    components(
        schemas(
            crate::response::ApiResponse<serde_json::Value>,
            crate::response::PaginatedResponse<serde_json::Value>,
            crate::response::PaginationQuery,
            crate::error::AppError,
            crate::models::Role,
            crate::models::UserStatus,
            crate::services::visibility::AuthorView,
            // Auth
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::AuthResponse,
            crate::handlers::auth::RegisterResponse,
            crate::handlers::auth::UserResponse,
            crate::handlers::auth::ChangePasswordRequest,
            // User
            crate::handlers::user::UserProfileResponse,
            crate::handlers::user::UserSummary,
            crate::handlers::user::UpdateProfileRequest,
            // Category
            crate::handlers::category::CategoryResponse,
            crate::handlers::category::CategoryRequest,
            // Post
            crate::handlers::post::PostResponse,
            crate::handlers::post::PostSummary,
            crate::handlers::post::CreatePostRequest,
            crate::handlers::post::UpdatePostRequest,
            crate::handlers::post::PostListQuery,
            // Comment
            crate::handlers::comment::CommentResponse,
            crate::handlers::comment::CommentTreeNode,
            crate::handlers::comment::CreateCommentRequest,
            crate::handlers::comment::UpdateCommentRequest,
            // Interaction
            crate::handlers::interaction::LikeResponse,
            crate::handlers::interaction::FavoriteResponse,
            // Follow
            crate::handlers::follow::FollowResponse,
            // Message
            crate::handlers::message::SendMessageRequest,
            crate::handlers::message::MessageResponse,
            crate::handlers::message::ConversationResponse,
            crate::handlers::message::UnreadTotalResponse,
            crate::handlers::message::MarkedReadResponse,
            // Notification
            crate::handlers::notification::NotificationResponse,
            crate::handlers::notification::UnreadCountResponse,
            // Resource
            crate::handlers::resource::ResourceRequest,
            crate::handlers::resource::ResourceResponse,
            crate::handlers::resource::DownloadResponse,
            crate::handlers::resource::ResourceListQuery,
            // Admin
            crate::services::admin::AdminStats,
            crate::services::cascade::CascadeReport,
            crate::services::counter::ReconcileEntry,
            crate::services::counter::ReconcileReport,
            crate::handlers::admin::AdminUserResponse,
            crate::handlers::admin::AdminUserListQuery,
            crate::handlers::admin::UpdateUserRequest,
            crate::handlers::admin::UpdateRoleRequest,
            crate::handlers::admin::ResetPasswordResponse,
            crate::handlers::admin::AuditLogResponse,
            crate::handlers::admin::AuditLogQuery,
        )
    ),
    tags(
        (name = "auth", description = "Authentication operations"),
        (name = "users", description = "User profile operations"),
        (name = "categories", description = "Category operations"),
        (name = "posts", description = "Post management operations"),
        (name = "comments", description = "Comment management operations"),
        (name = "interactions", description = "Like and favorite toggles"),
        (name = "follows", description = "Follow operations"),
        (name = "messages", description = "Private messaging"),
        (name = "notifications", description = "Notification operations"),
        (name = "resources", description = "Shared resource operations"),
        (name = "admin", description = "Administrative operations"),
    )
)]
struct ApiDoc;

struct JwtSecurity;

impl Modify for JwtSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_forum=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration before doing anything else
    let jwt_config = validate_config()?;
    utils::jwt::init_jwt_config(jwt_config)?;

    tracing::info!("Starting Campus Forum API v{}...", env!("CARGO_PKG_VERSION"));

    let db = config::database::get_database().await?;
    tracing::info!("Database connected successfully");

    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    services::bootstrap_admin::ensure_bootstrap_super_admin(&db).await?;

    let hub = PushHub::new();

    // Redis/Cache is optional - graceful degradation if unavailable
    let cache = match config::redis::get_redis().await {
        Ok(Some(conn)) => {
            tracing::info!("Redis connected successfully");
            Some(CacheService::new(conn))
        }
        Ok(None) => {
            tracing::info!("REDIS_URL not set, running without cache");
            None
        }
        Err(e) => {
            tracing::warn!("Redis unavailable, running without cache: {}", e);
            None
        }
    };

    let mut app = create_app().layer(Extension(db)).layer(Extension(hub));

    if let Some(cache) = cache {
        app = app.layer(Extension(cache));
    }

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    // Connect info feeds the per-IP rate limiter.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Validate all required configuration at startup (fail-fast).
fn validate_config() -> anyhow::Result<crate::config::jwt::JwtConfig> {
    let jwt_config = config::jwt::JwtConfig::from_env()?;

    // Checked here for an early error; the connection happens later
    if env::var("DATABASE_URL").is_err() {
        return Err(anyhow::anyhow!(
            "DATABASE_URL environment variable must be set"
        ));
    }

    Ok(jwt_config)
}

fn build_cors_layer() -> CorsLayer {
    use axum::http::{header, HeaderValue, Method};

    let origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins_str == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = origins_str
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

fn create_app() -> Router {
    Router::new()
        .route("/", get(health_check))
        .merge(routes::create_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn(
            middleware::security::security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Health check successful", body = serde_json::Value)
    )
)]
async fn health_check(
    Extension(db): Extension<DatabaseConnection>,
) -> impl IntoResponse {
    let db_ok = db
        .query_one(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT 1".to_string(),
        ))
        .await
        .is_ok();

    let status = if db_ok { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "service": "Campus Forum API",
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_ok,
    }))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received, gracefully shutting down..."),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
