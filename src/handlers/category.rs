use crate::error::{AppError, AppResult};
use crate::models::CategoryModel;
use crate::response::ApiResponse;
use crate::services::audit::{action, AuditLog};
use crate::services::cache::CacheService;
use crate::services::category::{CategoryInput, CategoryService};
use crate::services::visibility::ViewerContext;
use axum::{extract::Path, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub sort_order: i32,
    /// Posts here are shown without author identity
    pub is_anonymous: bool,
    pub post_count: i32,
    pub created_at: String,
}

impl From<CategoryModel> for CategoryResponse {
    fn from(c: CategoryModel) -> Self {
        Self {
            id: c.id,
            name: c.name,
            description: c.description,
            sort_order: c.sort_order,
            is_anonymous: c.is_anonymous,
            post_count: c.post_count,
            created_at: c.created_at.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub is_anonymous: bool,
}

impl CategoryRequest {
    fn as_input(&self) -> CategoryInput<'_> {
        CategoryInput {
            name: self.name.trim(),
            description: &self.description,
            sort_order: self.sort_order,
            is_anonymous: self.is_anonymous,
        }
    }
}

fn make_category_service(db: DatabaseConnection, cache: Option<Extension<CacheService>>) -> CategoryService {
    CategoryService::new(db).with_cache(cache.map(|c| c.0))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses(
        (status = 200, description = "All categories", body = Vec<CategoryResponse>),
    ),
    tag = "categories"
)]
pub async fn list_categories(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
) -> AppResult<impl IntoResponse> {
    let categories = make_category_service(db, cache).list().await?;
    let response: Vec<CategoryResponse> = categories
        .into_iter()
        .map(CategoryResponse::from)
        .collect();
    Ok(ApiResponse::ok(response))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category details", body = CategoryResponse),
        (status = 404, description = "Category not found", body = AppError),
    ),
    tag = "categories"
)]
pub async fn get_category(
    Extension(db): Extension<DatabaseConnection>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let category = CategoryService::new(db).get_by_id(id).await?;
    Ok(ApiResponse::ok(CategoryResponse::from(category)))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/categories",
    security(("jwt_token" = [])),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category created", body = CategoryResponse),
        (status = 403, description = "Admin only", body = AppError),
        (status = 409, description = "Name taken", body = AppError),
    ),
    tag = "admin"
)]
pub async fn create_category(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
    viewer: ViewerContext,
    Json(payload): Json<CategoryRequest>,
) -> AppResult<impl IntoResponse> {
    viewer.ensure_admin()?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let category = make_category_service(db.clone(), cache)
        .create(payload.as_input())
        .await?;

    AuditLog::new(db).record(
        viewer.user_id,
        action::CREATE_CATEGORY,
        "category",
        category.id,
        format!("created category '{}'", category.name),
    );
    Ok(ApiResponse::ok(CategoryResponse::from(category)))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/categories/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Category ID")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 403, description = "Admin only", body = AppError),
        (status = 404, description = "Category not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn update_category(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
    Json(payload): Json<CategoryRequest>,
) -> AppResult<impl IntoResponse> {
    viewer.ensure_admin()?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let category = make_category_service(db.clone(), cache)
        .update(id, payload.as_input())
        .await?;

    AuditLog::new(db).record(
        viewer.user_id,
        action::UPDATE_CATEGORY,
        "category",
        category.id,
        format!("updated category '{}'", category.name),
    );
    Ok(ApiResponse::ok(CategoryResponse::from(category)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/categories/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category deleted", body = String),
        (status = 400, description = "Category still has posts", body = AppError),
        (status = 403, description = "Admin only", body = AppError),
    ),
    tag = "admin"
)]
pub async fn delete_category(
    Extension(db): Extension<DatabaseConnection>,
    cache: Option<Extension<CacheService>>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    viewer.ensure_admin()?;

    let category = make_category_service(db.clone(), cache).delete(id).await?;

    AuditLog::new(db).record(
        viewer.user_id,
        action::DELETE_CATEGORY,
        "category",
        category.id,
        format!("deleted category '{}'", category.name),
    );
    Ok(ApiResponse::ok("Category deleted"))
}
