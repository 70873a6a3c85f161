use crate::error::{AppError, AppResult};
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement, TransactionTrait};
use serde::Serialize;
use utoipa::ToSchema;

/// Every denormalized counter column in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterField {
    PostLikes,
    PostComments,
    PostFavorites,
    PostViews,
    CommentLikes,
    CommentReplies,
    CategoryPosts,
    ResourceDownloads,
}

impl CounterField {
    /// `(table, column)` the counter lives in. Both are static identifiers,
    /// never user input, so they are safe to splice into SQL.
    pub const fn location(self) -> (&'static str, &'static str) {
        match self {
            CounterField::PostLikes => ("posts", "like_count"),
            CounterField::PostComments => ("posts", "comment_count"),
            CounterField::PostFavorites => ("posts", "favorite_count"),
            CounterField::PostViews => ("posts", "view_count"),
            CounterField::CommentLikes => ("comments", "like_count"),
            CounterField::CommentReplies => ("comments", "reply_count"),
            CounterField::CategoryPosts => ("categories", "post_count"),
            CounterField::ResourceDownloads => ("resources", "download_count"),
        }
    }

    fn update_sql(self) -> String {
        let (table, column) = self.location();
        format!("UPDATE {table} SET {column} = {column} + $1 WHERE id = $2 RETURNING {column}")
    }
}

/// Apply a signed delta to one counter with the store's own arithmetic and
/// return the new value. Must run on the same transaction as the fact write.
///
/// A failure here means the fact and its aggregate are about to disagree, so
/// it is reported on the `counter_drift` target before the error propagates
/// and the surrounding transaction rolls back.
pub async fn apply_delta<C: ConnectionTrait>(
    conn: &C,
    field: CounterField,
    owner_id: i32,
    delta: i32,
) -> AppResult<i32> {
    let (table, column) = field.location();
    let row = conn
        .query_one(Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            field.update_sql(),
            vec![delta.into(), owner_id.into()],
        ))
        .await;

    match row {
        Ok(Some(row)) => Ok(row.try_get::<i32>("", column)?),
        Ok(None) => {
            tracing::error!(
                target: "counter_drift",
                table, column, owner_id, delta,
                "counter owner vanished during update"
            );
            Err(AppError::Internal(anyhow::anyhow!(
                "counter owner {}#{} missing",
                table,
                owner_id
            )))
        }
        Err(err) => {
            tracing::error!(
                target: "counter_drift",
                table, column, owner_id, delta,
                error = %err,
                "counter update failed"
            );
            Err(AppError::Database(err))
        }
    }
}

/// Statements that rewrite each counter from its fact table, touching only
/// rows whose cached value disagrees.
const RECONCILE_STATEMENTS: &[(CounterField, &str)] = &[
    (
        CounterField::PostLikes,
        "UPDATE posts p SET like_count = s.n FROM (
            SELECT p2.id, COUNT(l.id)::int AS n FROM posts p2
            LEFT JOIN likes l ON l.target_type = 'post' AND l.target_id = p2.id
            GROUP BY p2.id
         ) s WHERE p.id = s.id AND p.like_count <> s.n",
    ),
    (
        CounterField::PostFavorites,
        "UPDATE posts p SET favorite_count = s.n FROM (
            SELECT p2.id, COUNT(f.id)::int AS n FROM posts p2
            LEFT JOIN favorites f ON f.post_id = p2.id
            GROUP BY p2.id
         ) s WHERE p.id = s.id AND p.favorite_count <> s.n",
    ),
    (
        CounterField::PostComments,
        "UPDATE posts p SET comment_count = s.n FROM (
            SELECT p2.id, COUNT(c.id)::int AS n FROM posts p2
            LEFT JOIN comments c ON c.post_id = p2.id AND c.is_deleted = FALSE
            GROUP BY p2.id
         ) s WHERE p.id = s.id AND p.comment_count <> s.n",
    ),
    (
        CounterField::CommentLikes,
        "UPDATE comments c SET like_count = s.n FROM (
            SELECT c2.id, COUNT(l.id)::int AS n FROM comments c2
            LEFT JOIN likes l ON l.target_type = 'comment' AND l.target_id = c2.id
            GROUP BY c2.id
         ) s WHERE c.id = s.id AND c.like_count <> s.n",
    ),
    (
        CounterField::CommentReplies,
        "UPDATE comments c SET reply_count = s.n FROM (
            SELECT c2.id, COUNT(r.id)::int AS n FROM comments c2
            LEFT JOIN comments r ON r.parent_id = c2.id AND r.is_deleted = FALSE
            GROUP BY c2.id
         ) s WHERE c.id = s.id AND c.reply_count <> s.n",
    ),
    (
        CounterField::CategoryPosts,
        "UPDATE categories c SET post_count = s.n FROM (
            SELECT c2.id, COUNT(p.id)::int AS n FROM categories c2
            LEFT JOIN posts p ON p.category_id = c2.id AND p.is_deleted = FALSE
            GROUP BY c2.id
         ) s WHERE c.id = s.id AND c.post_count <> s.n",
    ),
];

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconcileEntry {
    pub table: String,
    pub column: String,
    pub corrected: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconcileReport {
    pub entries: Vec<ReconcileEntry>,
    pub total_corrected: u64,
}

/// Out-of-band recompute of every fact-derived counter in one transaction.
pub async fn reconcile_all(db: &DatabaseConnection) -> AppResult<ReconcileReport> {
    let txn = db.begin().await?;
    let mut entries = Vec::with_capacity(RECONCILE_STATEMENTS.len());

    for (field, sql) in RECONCILE_STATEMENTS {
        let result = txn
            .execute(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                sql.to_string(),
            ))
            .await?;
        let (table, column) = field.location();
        if result.rows_affected() > 0 {
            tracing::warn!(
                target: "counter_drift",
                table,
                column,
                corrected = result.rows_affected(),
                "reconciliation corrected drifted counters"
            );
        }
        entries.push(ReconcileEntry {
            table: table.to_string(),
            column: column.to_string(),
            corrected: result.rows_affected(),
        });
    }

    txn.commit().await?;

    let total_corrected = entries.iter().map(|e| e.corrected).sum();
    Ok(ReconcileReport {
        entries,
        total_corrected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_is_a_single_atomic_statement() {
        let sql = CounterField::PostLikes.update_sql();
        assert_eq!(
            sql,
            "UPDATE posts SET like_count = like_count + $1 WHERE id = $2 RETURNING like_count"
        );
    }

    #[test]
    fn reconcile_statements_target_their_own_column() {
        for (field, sql) in RECONCILE_STATEMENTS {
            let (table, column) = field.location();
            assert!(sql.starts_with(&format!("UPDATE {table} ")), "{sql}");
            assert!(sql.contains(&format!("SET {column} = s.n")), "{sql}");
        }
    }

    #[test]
    fn traffic_counters_are_not_reconciled() {
        let fields: Vec<_> = RECONCILE_STATEMENTS.iter().map(|(f, _)| *f).collect();
        assert!(!fields.contains(&CounterField::PostViews));
        assert!(!fields.contains(&CounterField::ResourceDownloads));
    }

    #[test]
    fn soft_deleted_rows_are_excluded_from_recount() {
        let comments = RECONCILE_STATEMENTS
            .iter()
            .find(|(f, _)| *f == CounterField::PostComments)
            .map(|(_, sql)| *sql)
            .unwrap();
        assert!(comments.contains("is_deleted = FALSE"));
    }
}
