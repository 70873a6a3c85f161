use crate::{
    config::auth::AuthConfig,
    error::{AppError, AppResult},
    models::{user, User, UserModel, UserStatus},
    utils::{encode_access_token, hash_password, verify_password},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
};

pub struct AuthService {
    db: DatabaseConnection,
    config: AuthConfig,
}

/// Whether an account in `status` may obtain a token.
pub fn login_gate(status: UserStatus) -> AppResult<()> {
    match status {
        UserStatus::Active => Ok(()),
        UserStatus::Pending => Err(AppError::Forbidden(
            "Account is awaiting review".to_string(),
        )),
        UserStatus::Rejected => Err(AppError::Forbidden(
            "Registration was rejected".to_string(),
        )),
        UserStatus::Banned => Err(AppError::Forbidden("Account is banned".to_string())),
    }
}

impl AuthService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            config: AuthConfig::from_env(),
        }
    }

    /// Create an account. A token is only issued when the account is usable
    /// right away.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AppResult<(UserModel, Option<String>)> {
        if self.user_exists(username, email).await? {
            return Err(AppError::Conflict(
                "Username or email already exists".to_string(),
            ));
        }

        let status = if self.config.require_registration_review {
            UserStatus::Pending
        } else {
            UserStatus::Active
        };

        let now = chrono::Utc::now().naive_utc();
        let new_user = user::ActiveModel {
            username: sea_orm::ActiveValue::Set(username.to_string()),
            email: sea_orm::ActiveValue::Set(email.to_string()),
            password_hash: sea_orm::ActiveValue::Set(hash_password(password)?),
            avatar_url: sea_orm::ActiveValue::Set(None),
            bio: sea_orm::ActiveValue::Set(None),
            role: sea_orm::ActiveValue::Set("user".to_string()),
            status: sea_orm::ActiveValue::Set(status.as_str().to_string()),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        };

        // The unique indexes still catch a concurrent registration.
        let user = new_user.insert(&self.db).await.map_err(|e| {
            match e.sql_err() {
                Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => {
                    AppError::Conflict("Username or email already exists".to_string())
                }
                _ => AppError::Database(e),
            }
        })?;

        let token = match status {
            UserStatus::Active => Some(encode_access_token(user.id)?),
            _ => None,
        };
        tracing::info!(user_id = user.id, status = status.as_str(), "user registered");
        Ok((user, token))
    }

    pub async fn login(&self, username: &str, password: &str) -> AppResult<(UserModel, String)> {
        let user = User::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }
        login_gate(user.status())?;

        let token = encode_access_token(user.id)?;
        Ok((user, token))
    }

    pub async fn get_user_by_id(&self, id: i32) -> AppResult<UserModel> {
        User::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let user = self.get_user_by_id(user_id).await?;
        if !verify_password(current_password, &user.password_hash)? {
            return Err(AppError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let mut active: user::ActiveModel = user.into();
        active.password_hash = sea_orm::ActiveValue::Set(hash_password(new_password)?);
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());
        active.update(&self.db).await?;
        Ok(())
    }

    async fn user_exists(&self, username: &str, email: &str) -> AppResult<bool> {
        let count = User::find()
            .filter(
                sea_orm::Condition::any()
                    .add(user::Column::Username.eq(username))
                    .add(user::Column::Email.eq(email)),
            )
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_accounts_pass_login_gate() {
        assert!(login_gate(UserStatus::Active).is_ok());
        for status in [UserStatus::Pending, UserStatus::Rejected, UserStatus::Banned] {
            let err = login_gate(status).unwrap_err();
            assert_eq!(err.code(), "FORBIDDEN");
        }
    }

    #[test]
    fn pending_message_mentions_review() {
        match login_gate(UserStatus::Pending) {
            Err(AppError::Forbidden(msg)) => assert!(msg.contains("review")),
            other => panic!("unexpected: {:?}", other.err()),
        }
    }
}
