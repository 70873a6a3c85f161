use crate::{
    error::{AppError, AppResult},
    models::User,
    services::visibility::ViewerContext,
    utils::jwt::decode_jwt,
};
use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Extension,
};
use sea_orm::{DatabaseConnection, EntityTrait};

/// Resolve a bearer token to the caller. The user row is re-read on every
/// request so bans and role changes apply immediately.
async fn resolve_viewer(db: &DatabaseConnection, token: &str) -> AppResult<ViewerContext> {
    let claims = decode_jwt(token).map_err(|_| AppError::Unauthorized)?;
    let user_id = claims.user_id().ok_or(AppError::Unauthorized)?;

    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !user.is_active() {
        return Err(AppError::Forbidden("Account is not active".to_string()));
    }

    Ok(ViewerContext::from_user(&user))
}

/// Rejects the request unless it carries a valid token for an active user.
pub async fn auth_middleware(
    Extension(db): Extension<DatabaseConnection>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&headers).ok_or(AppError::Unauthorized)?;
    let viewer = resolve_viewer(&db, &token).await?;
    request.extensions_mut().insert(viewer);
    Ok(next.run(request).await)
}

/// Public reads: a usable token identifies the caller, anything else
/// continues anonymously.
pub async fn optional_auth_middleware(
    Extension(db): Extension<DatabaseConnection>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let viewer = match extract_bearer_token(&headers) {
        Some(token) => match resolve_viewer(&db, &token).await {
            Ok(viewer) => Some(viewer),
            Err(e) => {
                tracing::debug!("ignoring unusable token on public route: {}", e);
                None
            }
        },
        None => None,
    };
    request.extensions_mut().insert(MaybeViewer(viewer));
    next.run(request).await
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;

    let token = auth_header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

impl<S> FromRequestParts<S> for ViewerContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ViewerContext>()
            .copied()
            .ok_or(AppError::Unauthorized)
    }
}

/// Caller on a route where authentication is optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaybeViewer(pub Option<ViewerContext>);

impl<S> FromRequestParts<S> for MaybeViewer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<MaybeViewer>()
            .copied()
            .or_else(|| parts.extensions.get::<ViewerContext>().copied().map(|v| MaybeViewer(Some(v))))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::AUTHORIZATION, HeaderValue};

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(
            extract_bearer_token(&headers("Bearer abc.def")),
            Some("abc.def".to_string())
        );
    }

    #[test]
    fn other_schemes_and_blank_tokens_are_ignored() {
        assert_eq!(extract_bearer_token(&headers("Basic xyz")), None);
        assert_eq!(extract_bearer_token(&headers("Bearer ")), None);
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }
}
