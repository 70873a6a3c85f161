use crate::{
    error::{AppError, AppResult},
    models::{resource, Resource, ResourceModel},
    services::{
        counter::{self, CounterField},
        visibility::{scope_resources, ViewerContext},
    },
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};

pub struct ResourceService {
    db: DatabaseConnection,
}

pub struct ResourceInput<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub file_url: &'a str,
    pub is_public: bool,
}

impl ResourceService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(&self, owner_id: i32, input: ResourceInput<'_>) -> AppResult<ResourceModel> {
        let now = chrono::Utc::now().naive_utc();
        let model = resource::ActiveModel {
            owner_id: sea_orm::ActiveValue::Set(owner_id),
            title: sea_orm::ActiveValue::Set(input.title.to_string()),
            description: sea_orm::ActiveValue::Set(input.description.to_string()),
            file_url: sea_orm::ActiveValue::Set(input.file_url.to_string()),
            is_public: sea_orm::ActiveValue::Set(input.is_public),
            download_count: sea_orm::ActiveValue::Set(0),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        };
        Ok(model.insert(&self.db).await?)
    }

    /// Public resources plus the viewer's own, filtered in SQL so the total
    /// never counts private rows of other users.
    pub async fn list(
        &self,
        viewer: Option<&ViewerContext>,
        owner_id: Option<i32>,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<ResourceModel>, u64)> {
        let mut query = scope_resources(Resource::find(), viewer);
        if let Some(owner_id) = owner_id {
            query = query.filter(resource::Column::OwnerId.eq(owner_id));
        }

        let paginator = query
            .order_by_desc(resource::Column::CreatedAt)
            .order_by_desc(resource::Column::Id)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    /// Private resources of other users are reported as missing.
    pub async fn get(&self, viewer: Option<&ViewerContext>, id: i32) -> AppResult<ResourceModel> {
        scope_resources(Resource::find_by_id(id), viewer)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Resolve the file URL and count the download.
    pub async fn download(&self, viewer: Option<&ViewerContext>, id: i32) -> AppResult<ResourceModel> {
        let mut found = self.get(viewer, id).await?;
        found.download_count =
            counter::apply_delta(&self.db, CounterField::ResourceDownloads, id, 1).await?;
        Ok(found)
    }

    /// Moderation path: admins act on any resource, owners on their own.
    async fn find_for_edit(&self, viewer: &ViewerContext, id: i32) -> AppResult<ResourceModel> {
        let found = if viewer.is_admin() {
            Resource::find_by_id(id).one(&self.db).await?
        } else {
            scope_resources(Resource::find_by_id(id), Some(viewer))
                .one(&self.db)
                .await?
        }
        .ok_or(AppError::NotFound)?;
        viewer.ensure_owner_or_admin(found.owner_id)?;
        Ok(found)
    }

    pub async fn update(
        &self,
        viewer: &ViewerContext,
        id: i32,
        input: ResourceInput<'_>,
    ) -> AppResult<ResourceModel> {
        let existing = self.find_for_edit(viewer, id).await?;

        let mut active: resource::ActiveModel = existing.into();
        active.title = sea_orm::ActiveValue::Set(input.title.to_string());
        active.description = sea_orm::ActiveValue::Set(input.description.to_string());
        active.file_url = sea_orm::ActiveValue::Set(input.file_url.to_string());
        active.is_public = sea_orm::ActiveValue::Set(input.is_public);
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());
        Ok(active.update(&self.db).await?)
    }

    pub async fn delete(&self, viewer: &ViewerContext, id: i32) -> AppResult<ResourceModel> {
        let existing = self.find_for_edit(viewer, id).await?;
        Resource::delete_by_id(id).exec(&self.db).await?;
        Ok(existing)
    }
}
