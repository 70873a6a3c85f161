use crate::config::rate_limit::{RateLimitConfig, RateLimitRule};
use crate::handlers;
use crate::middleware::auth::{auth_middleware, optional_auth_middleware};
use crate::websocket;
use axum::{middleware, routing, Router};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

pub fn create_routes() -> Router {
    build_routes(&RateLimitConfig::from_env())
}

fn build_routes(rate_limit_config: &RateLimitConfig) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(rate_limit_config))
        // Token arrives as a query parameter and is checked inside the handler
        .route("/ws", routing::get(websocket::push::ws_handler))
}

fn api_routes(rate_limit_config: &RateLimitConfig) -> Router {
    let auth = auth_routes(rate_limit_config);
    let public_read = public_read_routes(rate_limit_config)
        .layer(middleware::from_fn(optional_auth_middleware));
    let protected =
        protected_routes(rate_limit_config).layer(middleware::from_fn(auth_middleware));
    let interaction =
        interaction_routes(rate_limit_config).layer(middleware::from_fn(auth_middleware));

    auth.merge(public_read).merge(protected).merge(interaction)
}

fn auth_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/auth/register", routing::post(handlers::register))
        .route("/auth/login", routing::post(handlers::login));

    with_optional_rate_limit(router, config.enabled, config.auth)
}

/// Reads that work without a token. A valid token personalises the answer.
fn public_read_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        // Users
        .route("/users/{id}", routing::get(handlers::user::get_user_profile))
        .route(
            "/users/{id}/followers",
            routing::get(handlers::follow::list_followers),
        )
        .route(
            "/users/{id}/following",
            routing::get(handlers::follow::list_following),
        )
        // Categories
        .route(
            "/categories",
            routing::get(handlers::category::list_categories),
        )
        .route(
            "/categories/{id}",
            routing::get(handlers::category::get_category),
        )
        // Posts
        .route("/posts", routing::get(handlers::post::list_posts))
        .route("/posts/{id}", routing::get(handlers::post::get_post))
        .route(
            "/posts/{id}/comments",
            routing::get(handlers::comment::list_comments),
        )
        // Resources
        .route(
            "/resources",
            routing::get(handlers::resource::list_resources),
        )
        .route(
            "/resources/{id}",
            routing::get(handlers::resource::get_resource),
        )
        .route(
            "/resources/{id}/download",
            routing::post(handlers::resource::download_resource),
        );

    with_optional_rate_limit(router, config.enabled, config.public_read)
}

fn protected_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        // Account
        .route("/auth/me", routing::get(handlers::get_current_user))
        .route(
            "/auth/profile",
            routing::put(handlers::user::update_profile),
        )
        .route("/auth/password", routing::put(handlers::change_password))
        // Posts
        .route("/posts", routing::post(handlers::post::create_post))
        .route(
            "/posts/{id}",
            routing::put(handlers::post::update_post).delete(handlers::post::delete_post),
        )
        .route(
            "/posts/{id}/restore",
            routing::post(handlers::post::restore_post),
        )
        .route("/posts/{id}/pin", routing::put(handlers::post::pin_post))
        .route("/posts/{id}/lock", routing::put(handlers::post::lock_post))
        // Comments
        .route(
            "/posts/{id}/comments",
            routing::post(handlers::comment::create_comment),
        )
        .route(
            "/comments/{id}",
            routing::put(handlers::comment::update_comment)
                .delete(handlers::comment::delete_comment),
        )
        .route(
            "/comments/{id}/restore",
            routing::post(handlers::comment::restore_comment),
        )
        // Favorites
        .route(
            "/favorites",
            routing::get(handlers::interaction::list_favorites),
        )
        // Messages (reads)
        .route(
            "/messages/conversations",
            routing::get(handlers::message::list_conversations),
        )
        .route(
            "/messages/unread-count",
            routing::get(handlers::message::unread_total),
        )
        .route(
            "/messages/with/{user_id}",
            routing::get(handlers::message::list_messages),
        )
        .route(
            "/messages/with/{user_id}/read",
            routing::put(handlers::message::mark_conversation_read),
        )
        .route(
            "/messages/{id}/read",
            routing::put(handlers::message::mark_message_read),
        )
        // Notifications
        .route(
            "/notifications",
            routing::get(handlers::notification::list_notifications),
        )
        .route(
            "/notifications/unread-count",
            routing::get(handlers::notification::unread_count),
        )
        .route(
            "/notifications/read-all",
            routing::put(handlers::notification::mark_all_read),
        )
        .route(
            "/notifications/{id}/read",
            routing::put(handlers::notification::mark_read),
        )
        // Resources
        .route(
            "/resources",
            routing::post(handlers::resource::create_resource),
        )
        .route(
            "/resources/{id}",
            routing::put(handlers::resource::update_resource)
                .delete(handlers::resource::delete_resource),
        )
        // Admin (role checked in handler)
        .route("/admin/stats", routing::get(handlers::admin::get_stats))
        .route("/admin/users", routing::get(handlers::admin::list_users))
        .route(
            "/admin/users/{id}",
            routing::get(handlers::admin::get_user).put(handlers::admin::update_user),
        )
        .route(
            "/admin/users/{id}/ban",
            routing::put(handlers::admin::ban_user),
        )
        .route(
            "/admin/users/{id}/unban",
            routing::put(handlers::admin::unban_user),
        )
        .route(
            "/admin/users/{id}/approve",
            routing::put(handlers::admin::approve_user),
        )
        .route(
            "/admin/users/{id}/reject",
            routing::put(handlers::admin::reject_user),
        )
        .route(
            "/admin/users/{id}/reset-password",
            routing::post(handlers::admin::reset_password),
        )
        .route(
            "/admin/users/{id}/role",
            routing::put(handlers::admin::update_user_role),
        )
        .route(
            "/admin/posts/{id}",
            routing::delete(handlers::admin::hard_delete_post),
        )
        .route(
            "/admin/posts/{id}/restore",
            routing::post(handlers::admin::admin_restore_post),
        )
        .route(
            "/admin/comments/{id}",
            routing::delete(handlers::admin::hard_delete_comment),
        )
        .route(
            "/admin/comments/{id}/restore",
            routing::post(handlers::admin::admin_restore_comment),
        )
        .route(
            "/admin/categories",
            routing::post(handlers::category::create_category),
        )
        .route(
            "/admin/categories/{id}",
            routing::put(handlers::category::update_category)
                .delete(handlers::category::delete_category),
        )
        .route(
            "/admin/reconcile",
            routing::post(handlers::admin::reconcile_counters),
        )
        .route(
            "/admin/audit-logs",
            routing::get(handlers::admin::list_audit_logs),
        );

    with_optional_rate_limit(router, config.enabled, config.protected)
}

/// Toggles and message sends, the endpoints repeated clicks hit hardest.
fn interaction_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route(
            "/posts/{id}/like",
            routing::post(handlers::interaction::like_post)
                .delete(handlers::interaction::unlike_post),
        )
        .route(
            "/comments/{id}/like",
            routing::post(handlers::interaction::like_comment)
                .delete(handlers::interaction::unlike_comment),
        )
        .route(
            "/posts/{id}/favorite",
            routing::post(handlers::interaction::favorite_post)
                .delete(handlers::interaction::unfavorite_post),
        )
        .route(
            "/users/{id}/follow",
            routing::post(handlers::follow::follow_user)
                .delete(handlers::follow::unfollow_user),
        )
        .route("/messages", routing::post(handlers::message::send_message));

    with_optional_rate_limit(router, config.enabled, config.interaction)
}

fn with_optional_rate_limit(router: Router, enabled: bool, rule: RateLimitRule) -> Router {
    if !enabled {
        return router;
    }

    match GovernorConfigBuilder::default()
        .per_second(rule.per_second)
        .burst_size(rule.burst_size)
        .finish()
    {
        Some(governor_conf) => router.layer(GovernorLayer::new(governor_conf)),
        None => {
            tracing::warn!(?rule, "invalid rate limit rule, group left unlimited");
            router
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, extract::Extension, http::Request};
    use sea_orm::DatabaseConnection;
    use tower::ServiceExt;

    fn app() -> Router {
        let config = RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        };
        build_routes(&config).layer(Extension(DatabaseConnection::Disconnected))
    }

    async fn status_of(method: &str, uri: &str) -> u16 {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        app().oneshot(request).await.unwrap().status().as_u16()
    }

    #[tokio::test]
    async fn write_routes_require_a_token() {
        assert_eq!(status_of("POST", "/api/v1/posts").await, 401);
        assert_eq!(status_of("DELETE", "/api/v1/posts/1").await, 401);
        assert_eq!(status_of("POST", "/api/v1/posts/1/like").await, 401);
        assert_eq!(status_of("DELETE", "/api/v1/users/1/follow").await, 401);
        assert_eq!(status_of("POST", "/api/v1/admin/reconcile").await, 401);
    }

    #[test]
    fn invalid_rule_leaves_group_unlimited() {
        let rule = RateLimitRule {
            per_second: 0,
            burst_size: 0,
        };
        // Builder rejects zero values; the router must still come back.
        let _router = with_optional_rate_limit(Router::new(), true, rule);
    }
}
