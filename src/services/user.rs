use crate::{
    error::{AppError, AppResult},
    models::{user, User, UserModel},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use std::collections::HashMap;

pub struct UserService {
    db: DatabaseConnection,
}

/// Load users by id in one query, for attaching authors to lists.
pub(crate) async fn load_users<C: ConnectionTrait>(
    conn: &C,
    ids: impl IntoIterator<Item = i32>,
) -> AppResult<HashMap<i32, UserModel>> {
    let mut ids: Vec<i32> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    Ok(User::find()
        .filter(user::Column::Id.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect())
}

impl UserService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<UserModel> {
        User::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn update_profile(
        &self,
        user_id: i32,
        bio: Option<String>,
        avatar_url: Option<String>,
    ) -> AppResult<UserModel> {
        let existing = self.get_by_id(user_id).await?;

        let mut active: user::ActiveModel = existing.into();
        active.bio = sea_orm::ActiveValue::Set(bio);
        active.avatar_url = sea_orm::ActiveValue::Set(avatar_url);
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());

        Ok(active.update(&self.db).await?)
    }
}
