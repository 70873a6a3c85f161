use crate::{
    error::{AppError, AppResult},
    models::{category, post, Category, Post, PostModel},
    services::{
        cache::CacheService,
        category::{find_category, CACHE_KEY_CATEGORY_LIST},
        counter::{self, CounterField},
        visibility::ViewerContext,
    },
};
use sea_orm::{
    sea_query::{Expr, Query},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Select, TransactionTrait,
};

/// Live posts, pinned first then newest.
fn list_query(filter: &PostListFilter) -> Select<Post> {
    let mut query = Post::find().filter(post::Column::IsDeleted.eq(false));
    if let Some(category_id) = filter.category_id {
        query = query.filter(post::Column::CategoryId.eq(category_id));
    }
    if let Some(author_id) = filter.author_id {
        // Listing by author must not reveal who wrote anonymous posts.
        let anonymous = Query::select()
            .column(category::Column::Id)
            .from(Category)
            .and_where(category::Column::IsAnonymous.eq(true))
            .to_owned();
        query = query
            .filter(post::Column::AuthorId.eq(author_id))
            .filter(post::Column::CategoryId.not_in_subquery(anonymous));
    }
    query
        .order_by_desc(post::Column::IsPinned)
        .order_by_desc(post::Column::CreatedAt)
        .order_by_desc(post::Column::Id)
}

pub struct PostService {
    db: DatabaseConnection,
    cache: Option<CacheService>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PostListFilter {
    pub category_id: Option<i32>,
    pub author_id: Option<i32>,
}

/// A post that exists and is not soft-deleted.
pub(crate) async fn find_live_post<C: ConnectionTrait>(conn: &C, id: i32) -> AppResult<PostModel> {
    Post::find_by_id(id)
        .filter(post::Column::IsDeleted.eq(false))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

impl PostService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db, cache: None }
    }

    /// Post count changes make the cached category list stale.
    pub fn with_cache(mut self, cache: Option<CacheService>) -> Self {
        self.cache = cache;
        self
    }

    pub async fn list(
        &self,
        filter: PostListFilter,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<PostModel>, u64)> {
        let paginator = list_query(&filter).paginate(&self.db, per_page);
        let total = paginator.num_items().await?;
        let posts = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((posts, total))
    }

    /// Fetch a live post for display, counting the view.
    pub async fn view(&self, id: i32) -> AppResult<PostModel> {
        let mut post = find_live_post(&self.db, id).await?;
        post.view_count = counter::apply_delta(&self.db, CounterField::PostViews, id, 1).await?;
        Ok(post)
    }

    pub async fn get_live(&self, id: i32) -> AppResult<PostModel> {
        find_live_post(&self.db, id).await
    }

    pub async fn create(
        &self,
        author_id: i32,
        category_id: i32,
        title: &str,
        content: &str,
    ) -> AppResult<PostModel> {
        let txn = self.db.begin().await?;
        find_category(&txn, category_id)
            .await
            .map_err(|_| AppError::Validation("Category does not exist".to_string()))?;

        let now = chrono::Utc::now().naive_utc();
        let new_post = post::ActiveModel {
            author_id: sea_orm::ActiveValue::Set(author_id),
            category_id: sea_orm::ActiveValue::Set(category_id),
            title: sea_orm::ActiveValue::Set(title.to_string()),
            content: sea_orm::ActiveValue::Set(content.to_string()),
            view_count: sea_orm::ActiveValue::Set(0),
            like_count: sea_orm::ActiveValue::Set(0),
            comment_count: sea_orm::ActiveValue::Set(0),
            favorite_count: sea_orm::ActiveValue::Set(0),
            is_pinned: sea_orm::ActiveValue::Set(false),
            is_locked: sea_orm::ActiveValue::Set(false),
            is_deleted: sea_orm::ActiveValue::Set(false),
            deleted_at: sea_orm::ActiveValue::Set(None),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        };

        let post = new_post.insert(&txn).await?;
        counter::apply_delta(&txn, CounterField::CategoryPosts, category_id, 1).await?;
        txn.commit().await?;

        self.invalidate_category_cache().await;
        Ok(post)
    }

    pub async fn update(
        &self,
        viewer: &ViewerContext,
        id: i32,
        title: &str,
        content: &str,
    ) -> AppResult<PostModel> {
        let existing = find_live_post(&self.db, id).await?;
        if existing.author_id != viewer.user_id {
            return Err(AppError::Forbidden(
                "Only the author can edit this post".to_string(),
            ));
        }

        let mut active: post::ActiveModel = existing.into();
        active.title = sea_orm::ActiveValue::Set(title.to_string());
        active.content = sea_orm::ActiveValue::Set(content.to_string());
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());

        Ok(active.update(&self.db).await?)
    }

    /// Mark a post deleted. The conditional update is the guard against a
    /// concurrent second delete decrementing the category twice.
    pub async fn soft_delete(&self, viewer: &ViewerContext, id: i32) -> AppResult<PostModel> {
        let existing = find_live_post(&self.db, id).await?;
        viewer.ensure_owner_or_admin(existing.author_id)?;

        let txn = self.db.begin().await?;
        let now = chrono::Utc::now().naive_utc();
        let result = Post::update_many()
            .col_expr(post::Column::IsDeleted, Expr::value(true))
            .col_expr(post::Column::DeletedAt, Expr::value(now))
            .filter(post::Column::Id.eq(id))
            .filter(post::Column::IsDeleted.eq(false))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        counter::apply_delta(&txn, CounterField::CategoryPosts, existing.category_id, -1).await?;
        txn.commit().await?;

        self.invalidate_category_cache().await;
        Ok(existing)
    }

    pub async fn restore(&self, viewer: &ViewerContext, id: i32) -> AppResult<PostModel> {
        let existing = Post::find_by_id(id)
            .filter(post::Column::IsDeleted.eq(true))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;
        viewer.ensure_owner_or_admin(existing.author_id)?;

        let txn = self.db.begin().await?;
        let result = Post::update_many()
            .col_expr(post::Column::IsDeleted, Expr::value(false))
            .col_expr(
                post::Column::DeletedAt,
                Expr::value(Option::<chrono::NaiveDateTime>::None),
            )
            .filter(post::Column::Id.eq(id))
            .filter(post::Column::IsDeleted.eq(true))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        counter::apply_delta(&txn, CounterField::CategoryPosts, existing.category_id, 1).await?;
        let restored = find_live_post(&txn, id).await?;
        txn.commit().await?;

        self.invalidate_category_cache().await;
        Ok(restored)
    }

    pub async fn toggle_pin(&self, id: i32) -> AppResult<PostModel> {
        let existing = find_live_post(&self.db, id).await?;
        let pinned = !existing.is_pinned;
        let mut active: post::ActiveModel = existing.into();
        active.is_pinned = sea_orm::ActiveValue::Set(pinned);
        Ok(active.update(&self.db).await?)
    }

    pub async fn toggle_lock(&self, id: i32) -> AppResult<PostModel> {
        let existing = find_live_post(&self.db, id).await?;
        let locked = !existing.is_locked;
        let mut active: post::ActiveModel = existing.into();
        active.is_locked = sea_orm::ActiveValue::Set(locked);
        Ok(active.update(&self.db).await?)
    }

    async fn invalidate_category_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate(CACHE_KEY_CATEGORY_LIST).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbBackend, QueryTrait};

    #[test]
    fn list_excludes_soft_deleted_and_pins_first() {
        let sql = list_query(&PostListFilter::default())
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#""posts"."is_deleted" = FALSE"#));
        assert!(sql.contains(r#"ORDER BY "posts"."is_pinned" DESC"#));
        assert!(!sql.contains("is_anonymous"));
    }

    #[test]
    fn author_listing_skips_anonymous_categories() {
        let sql = list_query(&PostListFilter {
            category_id: None,
            author_id: Some(4),
        })
        .build(DbBackend::Postgres)
        .to_string();
        assert!(sql.contains(r#""posts"."author_id" = 4"#));
        assert!(sql.contains("NOT IN (SELECT"));
        assert!(sql.contains(r#""is_anonymous" = TRUE"#));
    }
}
