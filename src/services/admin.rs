use crate::{
    error::{AppError, AppResult},
    models::{
        comment, post, user, Comment, Message, Post, Resource, Role, User, UserModel, UserStatus,
    },
    services::visibility::{find_visible_user, ScopedUsers, UserListQuery, ViewerContext},
    utils::{generate_temporary_password, hash_password},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
};
use serde::Serialize;
use utoipa::ToSchema;

pub struct AdminService {
    db: DatabaseConnection,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminStats {
    pub total_users: u64,
    pub pending_users: u64,
    pub banned_users: u64,
    pub total_posts: u64,
    pub deleted_posts: u64,
    pub total_comments: u64,
    pub total_resources: u64,
    pub total_messages: u64,
    pub users_today: u64,
    pub posts_today: u64,
}

#[derive(Debug, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
}

impl AdminService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// User figures go through the same hierarchy scope as the user list.
    pub async fn get_stats(&self, viewer: &ViewerContext) -> AppResult<AdminStats> {
        let today_start = chrono::Utc::now()
            .naive_utc()
            .date()
            .and_time(chrono::NaiveTime::MIN);
        let users = || ScopedUsers::for_viewer(viewer).into_select();

        Ok(AdminStats {
            total_users: users().count(&self.db).await?,
            pending_users: users()
                .filter(user::Column::Status.eq(UserStatus::Pending.as_str()))
                .count(&self.db)
                .await?,
            banned_users: users()
                .filter(user::Column::Status.eq(UserStatus::Banned.as_str()))
                .count(&self.db)
                .await?,
            total_posts: Post::find()
                .filter(post::Column::IsDeleted.eq(false))
                .count(&self.db)
                .await?,
            deleted_posts: Post::find()
                .filter(post::Column::IsDeleted.eq(true))
                .count(&self.db)
                .await?,
            total_comments: Comment::find()
                .filter(comment::Column::IsDeleted.eq(false))
                .count(&self.db)
                .await?,
            total_resources: Resource::find().count(&self.db).await?,
            total_messages: Message::find().count(&self.db).await?,
            users_today: users()
                .filter(user::Column::CreatedAt.gte(today_start))
                .count(&self.db)
                .await?,
            posts_today: Post::find()
                .filter(post::Column::CreatedAt.gte(today_start))
                .count(&self.db)
                .await?,
        })
    }

    pub async fn list_users(
        &self,
        viewer: &ViewerContext,
        query: &UserListQuery,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<UserModel>, u64)> {
        let paginator = ScopedUsers::for_viewer(viewer)
            .filter(query)
            .into_select()
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((users, total))
    }

    pub async fn get_user(&self, viewer: &ViewerContext, user_id: i32) -> AppResult<UserModel> {
        find_visible_user(&self.db, Some(viewer), user_id).await
    }

    /// Target for a mutating action: visible, not the caller, and not a
    /// fellow admin unless the caller is a super admin.
    async fn target_for_action(
        &self,
        viewer: &ViewerContext,
        user_id: i32,
    ) -> AppResult<UserModel> {
        let target = find_visible_user(&self.db, Some(viewer), user_id).await?;
        if target.id == viewer.user_id {
            return Err(AppError::Validation(
                "This action cannot target your own account".to_string(),
            ));
        }
        if target.role().is_admin() && !viewer.is_super_admin() {
            return Err(AppError::Forbidden(
                "Only a super admin can manage admin accounts".to_string(),
            ));
        }
        Ok(target)
    }

    pub async fn update_user(
        &self,
        viewer: &ViewerContext,
        user_id: i32,
        patch: UserPatch,
    ) -> AppResult<UserModel> {
        let target = find_visible_user(&self.db, Some(viewer), user_id).await?;
        if target.id != viewer.user_id && target.role().is_admin() && !viewer.is_super_admin() {
            return Err(AppError::Forbidden(
                "Only a super admin can manage admin accounts".to_string(),
            ));
        }

        if let Some(username) = &patch.username {
            self.ensure_free(user::Column::Username, username, user_id).await?;
        }
        if let Some(email) = &patch.email {
            self.ensure_free(user::Column::Email, email, user_id).await?;
        }

        let mut active: user::ActiveModel = target.into();
        if let Some(username) = patch.username {
            active.username = sea_orm::ActiveValue::Set(username);
        }
        if let Some(email) = patch.email {
            active.email = sea_orm::ActiveValue::Set(email);
        }
        if let Some(bio) = patch.bio {
            active.bio = sea_orm::ActiveValue::Set(Some(bio));
        }
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());
        Ok(active.update(&self.db).await?)
    }

    pub async fn ban_user(&self, viewer: &ViewerContext, user_id: i32) -> AppResult<UserModel> {
        let target = self.target_for_action(viewer, user_id).await?;
        self.transition(target, &[UserStatus::Active], UserStatus::Banned)
            .await
    }

    pub async fn unban_user(&self, viewer: &ViewerContext, user_id: i32) -> AppResult<UserModel> {
        let target = self.target_for_action(viewer, user_id).await?;
        self.transition(target, &[UserStatus::Banned], UserStatus::Active)
            .await
    }

    pub async fn approve_user(&self, viewer: &ViewerContext, user_id: i32) -> AppResult<UserModel> {
        let target = self.target_for_action(viewer, user_id).await?;
        self.transition(
            target,
            &[UserStatus::Pending, UserStatus::Rejected],
            UserStatus::Active,
        )
        .await
    }

    pub async fn reject_user(&self, viewer: &ViewerContext, user_id: i32) -> AppResult<UserModel> {
        let target = self.target_for_action(viewer, user_id).await?;
        self.transition(target, &[UserStatus::Pending], UserStatus::Rejected)
            .await
    }

    /// Returns the one-off password to hand to the user.
    pub async fn reset_password(
        &self,
        viewer: &ViewerContext,
        user_id: i32,
    ) -> AppResult<(UserModel, String)> {
        let target = self.target_for_action(viewer, user_id).await?;
        let temporary = generate_temporary_password();

        let mut active: user::ActiveModel = target.into();
        active.password_hash = sea_orm::ActiveValue::Set(hash_password(&temporary)?);
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());
        Ok((active.update(&self.db).await?, temporary))
    }

    pub async fn update_user_role(
        &self,
        viewer: &ViewerContext,
        user_id: i32,
        role: Role,
    ) -> AppResult<UserModel> {
        viewer.ensure_super_admin()?;
        let target = self.target_for_action(viewer, user_id).await?;

        let mut active: user::ActiveModel = target.into();
        active.role = sea_orm::ActiveValue::Set(role.as_str().to_string());
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());
        Ok(active.update(&self.db).await?)
    }

    async fn transition(
        &self,
        target: UserModel,
        from: &[UserStatus],
        to: UserStatus,
    ) -> AppResult<UserModel> {
        let current = target.status();
        if !from.contains(&current) {
            return Err(AppError::Validation(format!(
                "Cannot change status from {} to {}",
                current.as_str(),
                to.as_str()
            )));
        }

        let mut active: user::ActiveModel = target.into();
        active.status = sea_orm::ActiveValue::Set(to.as_str().to_string());
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());
        Ok(active.update(&self.db).await?)
    }

    async fn ensure_free(&self, column: user::Column, value: &str, except: i32) -> AppResult<()> {
        let taken = User::find()
            .filter(column.eq(value))
            .filter(user::Column::Id.ne(except))
            .count(&self.db)
            .await?;
        if taken > 0 {
            return Err(AppError::Conflict(
                "Username or email already exists".to_string(),
            ));
        }
        Ok(())
    }
}
