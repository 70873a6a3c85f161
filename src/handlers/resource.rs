use crate::error::{AppError, AppResult};
use crate::middleware::MaybeViewer;
use crate::models::ResourceModel;
use crate::response::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::services::resource::{ResourceInput, ResourceService};
use crate::services::visibility::ViewerContext;
use axum::{extract::Path, extract::Query, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResourceRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
    /// Location of the uploaded file
    #[validate(length(min = 1, max = 500))]
    pub file_url: String,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}

impl ResourceRequest {
    fn as_input(&self) -> ResourceInput<'_> {
        ResourceInput {
            title: self.title.trim(),
            description: &self.description,
            file_url: self.file_url.trim(),
            is_public: self.is_public,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResourceResponse {
    pub id: i32,
    pub owner_id: i32,
    pub title: String,
    pub description: String,
    pub file_url: String,
    pub is_public: bool,
    pub download_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ResourceModel> for ResourceResponse {
    fn from(r: ResourceModel) -> Self {
        Self {
            id: r.id,
            owner_id: r.owner_id,
            title: r.title,
            description: r.description,
            file_url: r.file_url,
            is_public: r.is_public,
            download_count: r.download_count,
            created_at: r.created_at.to_string(),
            updated_at: r.updated_at.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DownloadResponse {
    pub file_url: String,
    pub download_count: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResourceListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub owner_id: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/v1/resources",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
        ("owner_id" = Option<i32>, Query, description = "Filter by owner"),
    ),
    responses(
        (status = 200, description = "Public resources plus the caller's own", body = PaginatedResponse<ResourceResponse>),
    ),
    tag = "resources"
)]
pub async fn list_resources(
    Extension(db): Extension<DatabaseConnection>,
    MaybeViewer(viewer): MaybeViewer,
    Query(params): Query<ResourceListQuery>,
) -> AppResult<impl IntoResponse> {
    let (page, per_page) = PaginationQuery {
        page: params.page,
        per_page: params.per_page,
    }
    .resolve();

    let (resources, total) = ResourceService::new(db)
        .list(viewer.as_ref(), params.owner_id, page, per_page)
        .await?;
    let items: Vec<ResourceResponse> = resources.into_iter().map(ResourceResponse::from).collect();

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/resources/{id}",
    params(("id" = i32, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Resource details", body = ResourceResponse),
        (status = 404, description = "Not found or private", body = AppError),
    ),
    tag = "resources"
)]
pub async fn get_resource(
    Extension(db): Extension<DatabaseConnection>,
    MaybeViewer(viewer): MaybeViewer,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let resource = ResourceService::new(db).get(viewer.as_ref(), id).await?;
    Ok(ApiResponse::ok(ResourceResponse::from(resource)))
}

#[utoipa::path(
    post,
    path = "/api/v1/resources/{id}/download",
    params(("id" = i32, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "File location, download counted", body = DownloadResponse),
        (status = 404, description = "Not found or private", body = AppError),
    ),
    tag = "resources"
)]
pub async fn download_resource(
    Extension(db): Extension<DatabaseConnection>,
    MaybeViewer(viewer): MaybeViewer,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let resource = ResourceService::new(db)
        .download(viewer.as_ref(), id)
        .await?;
    Ok(ApiResponse::ok(DownloadResponse {
        file_url: resource.file_url,
        download_count: resource.download_count,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/resources",
    security(("jwt_token" = [])),
    request_body = ResourceRequest,
    responses(
        (status = 200, description = "Resource created", body = ResourceResponse),
        (status = 400, description = "Validation error", body = AppError),
    ),
    tag = "resources"
)]
pub async fn create_resource(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Json(payload): Json<ResourceRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let resource = ResourceService::new(db)
        .create(viewer.user_id, payload.as_input())
        .await?;
    Ok(ApiResponse::ok(ResourceResponse::from(resource)))
}

#[utoipa::path(
    put,
    path = "/api/v1/resources/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Resource ID")),
    request_body = ResourceRequest,
    responses(
        (status = 200, description = "Resource updated", body = ResourceResponse),
        (status = 403, description = "Not the owner", body = AppError),
        (status = 404, description = "Not found", body = AppError),
    ),
    tag = "resources"
)]
pub async fn update_resource(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
    Json(payload): Json<ResourceRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let resource = ResourceService::new(db)
        .update(&viewer, id, payload.as_input())
        .await?;
    Ok(ApiResponse::ok(ResourceResponse::from(resource)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/resources/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Resource deleted", body = String),
        (status = 403, description = "Not the owner", body = AppError),
        (status = 404, description = "Not found", body = AppError),
    ),
    tag = "resources"
)]
pub async fn delete_resource(
    Extension(db): Extension<DatabaseConnection>,
    viewer: ViewerContext,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    ResourceService::new(db).delete(&viewer, id).await?;
    Ok(ApiResponse::ok("Resource deleted"))
}
