use crate::{
    error::{AppError, AppResult},
    models::{category, post, Category, CategoryModel, Post},
    services::cache::CacheService,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};

pub(crate) const CACHE_KEY_CATEGORY_LIST: &str = "categories:list";
const CACHE_TTL_CATEGORIES: u64 = 60;

pub struct CategoryService {
    db: DatabaseConnection,
    cache: Option<CacheService>,
}

pub struct CategoryInput<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub sort_order: i32,
    pub is_anonymous: bool,
}

impl CategoryService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, cache: None }
    }

    pub fn with_cache(mut self, cache: Option<CacheService>) -> Self {
        self.cache = cache;
        self
    }

    pub async fn list(&self) -> AppResult<Vec<CategoryModel>> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache
                .get::<Vec<CategoryModel>>(CACHE_KEY_CATEGORY_LIST)
                .await
            {
                return Ok(cached);
            }
        }

        let categories = Category::find()
            .order_by_asc(category::Column::SortOrder)
            .order_by_asc(category::Column::Id)
            .all(&self.db)
            .await?;

        if let Some(cache) = &self.cache {
            cache
                .set(CACHE_KEY_CATEGORY_LIST, &categories, CACHE_TTL_CATEGORIES)
                .await;
        }

        Ok(categories)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<CategoryModel> {
        find_category(&self.db, id).await
    }

    pub async fn create(&self, input: CategoryInput<'_>) -> AppResult<CategoryModel> {
        self.ensure_name_free(input.name, None).await?;
        let now = chrono::Utc::now().naive_utc();

        let new_category = category::ActiveModel {
            name: sea_orm::ActiveValue::Set(input.name.to_string()),
            description: sea_orm::ActiveValue::Set(input.description.to_string()),
            sort_order: sea_orm::ActiveValue::Set(input.sort_order),
            is_anonymous: sea_orm::ActiveValue::Set(input.is_anonymous),
            post_count: sea_orm::ActiveValue::Set(0),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        };

        let created = new_category.insert(&self.db).await?;
        self.invalidate_list_cache().await;
        Ok(created)
    }

    /// post_count is deliberately not writable here.
    pub async fn update(&self, id: i32, input: CategoryInput<'_>) -> AppResult<CategoryModel> {
        let existing = self.get_by_id(id).await?;
        self.ensure_name_free(input.name, Some(id)).await?;

        let mut active: category::ActiveModel = existing.into();
        active.name = sea_orm::ActiveValue::Set(input.name.to_string());
        active.description = sea_orm::ActiveValue::Set(input.description.to_string());
        active.sort_order = sea_orm::ActiveValue::Set(input.sort_order);
        active.is_anonymous = sea_orm::ActiveValue::Set(input.is_anonymous);
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());

        let updated = active.update(&self.db).await?;
        self.invalidate_list_cache().await;
        Ok(updated)
    }

    /// Soft-deleted posts still reference the category, so they block
    /// deletion as well.
    pub async fn delete(&self, id: i32) -> AppResult<CategoryModel> {
        let existing = self.get_by_id(id).await?;
        let referencing = Post::find()
            .filter(post::Column::CategoryId.eq(id))
            .count(&self.db)
            .await?;
        if existing.post_count > 0 || referencing > 0 {
            return Err(AppError::Validation(
                "Category still contains posts".to_string(),
            ));
        }

        Category::delete_by_id(id).exec(&self.db).await?;
        self.invalidate_list_cache().await;
        Ok(existing)
    }

    async fn ensure_name_free(&self, name: &str, except: Option<i32>) -> AppResult<()> {
        let mut query = Category::find().filter(category::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(category::Column::Id.ne(id));
        }
        if query.one(&self.db).await?.is_some() {
            return Err(AppError::Conflict("Category name already exists".to_string()));
        }
        Ok(())
    }

    async fn invalidate_list_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate(CACHE_KEY_CATEGORY_LIST).await;
        }
    }
}

pub(crate) async fn find_category<C: ConnectionTrait>(conn: &C, id: i32) -> AppResult<CategoryModel> {
    Category::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

/// Whether content in `category_id` is shown without author identity.
pub(crate) async fn is_anonymous<C: ConnectionTrait>(conn: &C, category_id: i32) -> AppResult<bool> {
    Ok(Category::find_by_id(category_id)
        .one(conn)
        .await?
        .is_some_and(|c| c.is_anonymous))
}
