use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_notifications_user_created
             ON notifications (user_id, created_at DESC)",
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_posts_category_visible_created
             ON posts (category_id, is_deleted, is_pinned DESC, created_at DESC)",
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_users_role_status ON users (role, status)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("DROP INDEX IF EXISTS idx_notifications_user_created")
            .await?;
        db.execute_unprepared("DROP INDEX IF EXISTS idx_posts_category_visible_created")
            .await?;
        db.execute_unprepared("DROP INDEX IF EXISTS idx_users_role_status")
            .await?;

        Ok(())
    }
}
