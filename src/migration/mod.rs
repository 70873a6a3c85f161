use sea_orm_migration::prelude::*;

mod m20240101_000001_create_users_table;
mod m20240101_000002_create_categories_table;
mod m20240101_000003_create_posts_table;
mod m20240101_000004_create_comments_table;
mod m20240101_000005_create_likes_table;
mod m20240101_000006_create_favorites_and_follows_tables;
mod m20240101_000007_create_messages_table;
mod m20240101_000008_create_notifications_table;
mod m20240101_000009_create_resources_table;
mod m20240101_000010_create_admin_logs_table;
mod m20240101_000011_add_performance_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_create_categories_table::Migration),
            Box::new(m20240101_000003_create_posts_table::Migration),
            Box::new(m20240101_000004_create_comments_table::Migration),
            Box::new(m20240101_000005_create_likes_table::Migration),
            Box::new(m20240101_000006_create_favorites_and_follows_tables::Migration),
            Box::new(m20240101_000007_create_messages_table::Migration),
            Box::new(m20240101_000008_create_notifications_table::Migration),
            Box::new(m20240101_000009_create_resources_table::Migration),
            Box::new(m20240101_000010_create_admin_logs_table::Migration),
            Box::new(m20240101_000011_add_performance_indexes::Migration),
        ]
    }
}
