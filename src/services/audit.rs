use crate::{
    error::AppResult,
    models::{admin_log, AdminLog, AdminLogModel},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};

/// Admin actions written to the audit log.
pub mod action {
    pub const BAN_USER: &str = "ban_user";
    pub const UNBAN_USER: &str = "unban_user";
    pub const UPDATE_USER: &str = "update_user";
    pub const UPDATE_ROLE: &str = "update_role";
    pub const RESET_PASSWORD: &str = "reset_password";
    pub const APPROVE_USER: &str = "approve_user";
    pub const REJECT_USER: &str = "reject_user";
    pub const DELETE_POST: &str = "delete_post";
    pub const DELETE_COMMENT: &str = "delete_comment";
    pub const RESTORE_POST: &str = "restore_post";
    pub const RESTORE_COMMENT: &str = "restore_comment";
    pub const PIN_POST: &str = "pin_post";
    pub const LOCK_POST: &str = "lock_post";
    pub const CREATE_CATEGORY: &str = "create_category";
    pub const UPDATE_CATEGORY: &str = "update_category";
    pub const DELETE_CATEGORY: &str = "delete_category";
    pub const RECONCILE_COUNTERS: &str = "reconcile_counters";
}

#[derive(Clone)]
pub struct AuditLog {
    db: DatabaseConnection,
}

impl AuditLog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Write the entry on a background task. The caller never waits on it and
    /// a failure is only logged.
    pub fn record(
        &self,
        admin_id: i32,
        action: &'static str,
        target_type: &'static str,
        target_id: i32,
        description: impl Into<String>,
    ) {
        let db = self.db.clone();
        let description = description.into();
        tokio::spawn(async move {
            let entry = admin_log::ActiveModel {
                admin_id: sea_orm::ActiveValue::Set(admin_id),
                action: sea_orm::ActiveValue::Set(action.to_string()),
                target_type: sea_orm::ActiveValue::Set(target_type.to_string()),
                target_id: sea_orm::ActiveValue::Set(target_id),
                description: sea_orm::ActiveValue::Set(description),
                created_at: sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc()),
                ..Default::default()
            };
            if let Err(e) = entry.insert(&db).await {
                tracing::warn!(admin_id, action, target_id, "audit log write failed: {}", e);
            }
        });
    }

    pub async fn list(
        &self,
        action: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<AdminLogModel>, u64)> {
        let mut query = AdminLog::find();
        if let Some(action) = action {
            query = query.filter(admin_log::Column::Action.eq(action));
        }
        let paginator = query
            .order_by_desc(admin_log::Column::CreatedAt)
            .order_by_desc(admin_log::Column::Id)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }
}
