use crate::config::auth::BootstrapSuperAdminConfig;
use crate::error::AppResult;
use crate::models::{user, Role, User, UserStatus};
use crate::utils::hash_password;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Make sure at least one super admin exists at startup.
///
/// Nothing happens if one already exists. Otherwise an account matching the
/// configured username or email is promoted, or a new one is created.
pub async fn ensure_bootstrap_super_admin(db: &DatabaseConnection) -> AppResult<()> {
    let Some(cfg) = BootstrapSuperAdminConfig::from_env() else {
        return Ok(());
    };

    let exists = User::find()
        .filter(user::Column::Role.eq(Role::SuperAdmin.as_str()))
        .one(db)
        .await?
        .is_some();
    if exists {
        return Ok(());
    }

    let existing = User::find()
        .filter(
            sea_orm::Condition::any()
                .add(user::Column::Email.eq(cfg.email.clone()))
                .add(user::Column::Username.eq(cfg.username.clone())),
        )
        .one(db)
        .await?;

    let now = chrono::Utc::now().naive_utc();

    if let Some(found) = existing {
        let user_id = found.id;
        let mut active: user::ActiveModel = found.into();
        active.role = sea_orm::ActiveValue::Set(Role::SuperAdmin.as_str().to_string());
        active.status = sea_orm::ActiveValue::Set(UserStatus::Active.as_str().to_string());
        active.updated_at = sea_orm::ActiveValue::Set(now);
        active.update(db).await?;
        tracing::info!(user_id, "promoted existing account to super_admin");
        return Ok(());
    }

    let created = user::ActiveModel {
        username: sea_orm::ActiveValue::Set(cfg.username),
        email: sea_orm::ActiveValue::Set(cfg.email),
        password_hash: sea_orm::ActiveValue::Set(hash_password(&cfg.password)?),
        avatar_url: sea_orm::ActiveValue::Set(None),
        bio: sea_orm::ActiveValue::Set(None),
        role: sea_orm::ActiveValue::Set(Role::SuperAdmin.as_str().to_string()),
        status: sea_orm::ActiveValue::Set(UserStatus::Active.as_str().to_string()),
        created_at: sea_orm::ActiveValue::Set(now),
        updated_at: sea_orm::ActiveValue::Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(user_id = created.id, "created bootstrap super_admin");
    Ok(())
}
