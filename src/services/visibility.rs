//! Read-side access rules: who may see which author, user row, or resource.
//!
//! Everything here takes the caller's [`ViewerContext`] as an argument. The
//! filters that hide rows are applied to the query itself so that pagination
//! totals never count rows the caller cannot see.

use crate::{
    error::{AppError, AppResult},
    models::{category, resource, user, Category, Resource, Role, User, UserModel, UserStatus},
    services::user::load_users,
};
use sea_orm::{
    sea_query::{Query, SelectStatement},
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Select,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;

/// Identity of the caller, resolved by the auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerContext {
    pub user_id: i32,
    pub role: Role,
}

impl ViewerContext {
    pub fn new(user_id: i32, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn from_user(user: &UserModel) -> Self {
        Self::new(user.id, user.role())
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    /// Owner of the row, or any admin.
    pub fn ensure_owner_or_admin(&self, owner_id: i32) -> AppResult<()> {
        if self.user_id == owner_id || self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Only the owner or an admin can do this".to_string(),
            ))
        }
    }

    pub fn ensure_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }

    pub fn ensure_super_admin(&self) -> AppResult<()> {
        if self.is_super_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Super admin access required".to_string()))
        }
    }
}

/// Author block embedded in post, comment and notification responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AuthorView {
    pub id: Option<i32>,
    pub username: String,
    pub avatar_url: Option<String>,
    pub is_anonymous: bool,
}

pub const ANONYMOUS_USERNAME: &str = "匿名用户";

impl AuthorView {
    pub fn anonymous() -> Self {
        Self {
            id: None,
            username: ANONYMOUS_USERNAME.to_string(),
            avatar_url: None,
            is_anonymous: true,
        }
    }

    fn of(user: &UserModel) -> Self {
        Self {
            id: Some(user.id),
            username: user.username.clone(),
            avatar_url: user.avatar_url.clone(),
            is_anonymous: false,
        }
    }

    /// Placeholder for an author row that no longer exists.
    fn missing(author_id: i32) -> Self {
        Self {
            id: Some(author_id),
            username: "[deleted]".to_string(),
            avatar_url: None,
            is_anonymous: false,
        }
    }
}

/// Author identity as shown to readers. Content in an anonymous category is
/// masked for every viewer, its own author included; stored authorship is
/// left untouched.
pub fn mask_author(author_id: i32, author: Option<&UserModel>, anonymous_category: bool) -> AuthorView {
    if anonymous_category {
        return AuthorView::anonymous();
    }
    author.map_or_else(|| AuthorView::missing(author_id), AuthorView::of)
}

/// Whether `viewer` may see a user row with `target_role` at all. Plain
/// admins are the only callers kept away from super admins.
pub fn can_see_user(viewer: &ViewerContext, target_role: Role) -> bool {
    !(viewer.role == Role::Admin && target_role == Role::SuperAdmin)
}

/// Typed filter for the admin user list. Only these fields can be filtered on.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UserListQuery {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub keyword: Option<String>,
}

/// A user query that has already been narrowed to what the viewer may see.
/// The only way to build one is through [`ScopedUsers::for_caller`].
pub struct ScopedUsers(Select<User>);

impl ScopedUsers {
    pub fn for_viewer(viewer: &ViewerContext) -> Self {
        Self::for_caller(Some(viewer))
    }

    /// Anonymous callers are scoped like regular users.
    pub fn for_caller(viewer: Option<&ViewerContext>) -> Self {
        match viewer {
            Some(v) if !can_see_user(v, Role::SuperAdmin) => Self(
                User::find().filter(user::Column::Role.ne(Role::SuperAdmin.as_str())),
            ),
            _ => Self(User::find()),
        }
    }

    pub fn filter(self, query: &UserListQuery) -> Self {
        let mut select = self.0;
        if let Some(role) = query.role {
            select = select.filter(user::Column::Role.eq(role.as_str()));
        }
        if let Some(status) = query.status {
            select = select.filter(user::Column::Status.eq(status.as_str()));
        }
        if let Some(keyword) = query.keyword.as_deref().map(str::trim) {
            if !keyword.is_empty() {
                let pattern = format!("%{}%", keyword);
                select = select.filter(
                    Condition::any()
                        .add(user::Column::Username.like(pattern.clone()))
                        .add(user::Column::Email.like(pattern)),
                );
            }
        }
        Self(select)
    }

    pub fn into_select(self) -> Select<User> {
        self.0.order_by_desc(user::Column::CreatedAt)
    }
}

/// Direct lookup by id through the hierarchy filter. Hidden rows are
/// indistinguishable from missing ones. Every user-keyed read or mutation
/// resolves its target here.
pub async fn find_visible_user<C: ConnectionTrait>(
    conn: &C,
    viewer: Option<&ViewerContext>,
    user_id: i32,
) -> AppResult<UserModel> {
    ScopedUsers::for_caller(viewer)
        .0
        .filter(user::Column::Id.eq(user_id))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

/// Ids of user rows the viewer must not see, as a subquery for lists that
/// return users through another table (followers, following).
pub fn hidden_user_ids(viewer: Option<&ViewerContext>) -> Option<SelectStatement> {
    match viewer {
        Some(v) if !can_see_user(v, Role::SuperAdmin) => Some(
            Query::select()
                .column(user::Column::Id)
                .from(User)
                .and_where(user::Column::Role.eq(Role::SuperAdmin.as_str()))
                .to_owned(),
        ),
        _ => None,
    }
}

/// Authors and category anonymity for a page of posts or comments, loaded
/// once so masking stays a lookup per row.
#[derive(Debug, Default)]
pub struct AuthorDirectory {
    users: HashMap<i32, UserModel>,
    anonymous_categories: HashSet<i32>,
}

impl AuthorDirectory {
    pub async fn load<C: ConnectionTrait>(
        conn: &C,
        author_ids: impl IntoIterator<Item = i32>,
        category_ids: impl IntoIterator<Item = i32>,
    ) -> AppResult<Self> {
        let mut category_ids: Vec<i32> = category_ids.into_iter().collect();
        category_ids.sort_unstable();
        category_ids.dedup();

        let anonymous_categories = if category_ids.is_empty() {
            HashSet::new()
        } else {
            Category::find()
                .filter(category::Column::Id.is_in(category_ids))
                .filter(category::Column::IsAnonymous.eq(true))
                .all(conn)
                .await?
                .into_iter()
                .map(|c| c.id)
                .collect()
        };

        Ok(Self {
            users: load_users(conn, author_ids).await?,
            anonymous_categories,
        })
    }

    pub fn is_anonymous(&self, category_id: i32) -> bool {
        self.anonymous_categories.contains(&category_id)
    }

    pub fn author(&self, author_id: i32, category_id: i32) -> AuthorView {
        mask_author(
            author_id,
            self.users.get(&author_id),
            self.is_anonymous(category_id),
        )
    }
}

/// Resources the viewer may see: public ones plus their own.
pub fn scope_resources(select: Select<Resource>, viewer: Option<&ViewerContext>) -> Select<Resource> {
    let condition = match viewer {
        Some(v) => Condition::any()
            .add(resource::Column::IsPublic.eq(true))
            .add(resource::Column::OwnerId.eq(v.user_id)),
        None => Condition::all().add(resource::Column::IsPublic.eq(true)),
    };
    select.filter(condition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use sea_orm::{DbBackend, QueryTrait};

    fn user(id: i32, role: Role) -> UserModel {
        let now = NaiveDateTime::default();
        UserModel {
            id,
            username: format!("user{}", id),
            email: format!("user{}@campus.edu", id),
            password_hash: String::new(),
            avatar_url: Some("/a.png".to_string()),
            bio: None,
            role: role.as_str().to_string(),
            status: "active".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn anonymous_category_masks_for_everyone() {
        let author = user(7, Role::User);
        let masked = mask_author(7, Some(&author), true);
        assert_eq!(masked, AuthorView::anonymous());
        assert_eq!(masked.id, None);
    }

    #[test]
    fn regular_category_shows_author() {
        let author = user(7, Role::User);
        let shown = mask_author(7, Some(&author), false);
        assert_eq!(shown.id, Some(7));
        assert_eq!(shown.username, "user7");
    }

    #[test]
    fn missing_author_gets_placeholder() {
        let shown = mask_author(9, None, false);
        assert_eq!(shown.username, "[deleted]");
    }

    #[test]
    fn directory_masks_by_category() {
        let mut directory = AuthorDirectory::default();
        directory.users.insert(7, user(7, Role::User));
        directory.anonymous_categories.insert(2);

        assert_eq!(directory.author(7, 1).id, Some(7));
        assert_eq!(directory.author(7, 2), AuthorView::anonymous());
    }

    #[test]
    fn only_plain_admins_get_a_hidden_user_subquery() {
        let admin = ViewerContext::new(1, Role::Admin);
        let sql = hidden_user_ids(Some(&admin))
            .map(|q| q.to_string(sea_orm::sea_query::PostgresQueryBuilder))
            .unwrap_or_default();
        assert!(sql.contains("'super_admin'"));
        assert!(hidden_user_ids(Some(&ViewerContext::new(2, Role::SuperAdmin))).is_none());
        assert!(hidden_user_ids(Some(&ViewerContext::new(3, Role::User))).is_none());
        assert!(hidden_user_ids(None).is_none());
    }

    #[test]
    fn admins_cannot_see_super_admins() {
        let admin = ViewerContext::new(1, Role::Admin);
        let root = ViewerContext::new(2, Role::SuperAdmin);
        assert!(!can_see_user(&admin, Role::SuperAdmin));
        assert!(can_see_user(&admin, Role::Admin));
        assert!(can_see_user(&root, Role::SuperAdmin));
        assert!(can_see_user(&ViewerContext::new(3, Role::User), Role::SuperAdmin));
    }

    #[test]
    fn admin_scope_excludes_super_admin_rows_in_sql() {
        let admin = ViewerContext::new(1, Role::Admin);
        let sql = ScopedUsers::for_viewer(&admin)
            .filter(&UserListQuery {
                role: Some(Role::SuperAdmin),
                ..Default::default()
            })
            .into_select()
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#""role" <> 'super_admin'"#), "{sql}");
        assert!(sql.contains(r#""role" = 'super_admin'"#), "{sql}");
    }

    #[test]
    fn direct_lookups_hide_super_admins_only_from_admins() {
        let sql = |viewer: Option<&ViewerContext>| {
            ScopedUsers::for_caller(viewer)
                .into_select()
                .build(DbBackend::Postgres)
                .to_string()
        };
        let admin = ViewerContext::new(1, Role::Admin);
        let user = ViewerContext::new(2, Role::User);
        assert!(sql(Some(&admin)).contains(r#""role" <> 'super_admin'"#));
        assert!(!sql(Some(&user)).contains("super_admin"));
        assert!(!sql(None).contains("super_admin"));
    }

    #[test]
    fn super_admin_scope_is_unrestricted() {
        let root = ViewerContext::new(1, Role::SuperAdmin);
        let sql = ScopedUsers::for_viewer(&root)
            .into_select()
            .build(DbBackend::Postgres)
            .to_string();
        assert!(!sql.contains("super_admin"), "{sql}");
    }

    #[test]
    fn resource_scope_is_in_where_clause() {
        let viewer = ViewerContext::new(5, Role::User);
        let sql = scope_resources(Resource::find(), Some(&viewer))
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#""is_public" = TRUE"#), "{sql}");
        assert!(sql.contains(r#""owner_id" = 5"#), "{sql}");

        let anon = scope_resources(Resource::find(), None)
            .build(DbBackend::Postgres)
            .to_string();
        assert!(!anon.contains("owner_id\" ="), "{anon}");
    }

    #[test]
    fn ownership_check() {
        let owner = ViewerContext::new(3, Role::User);
        let other = ViewerContext::new(4, Role::User);
        let admin = ViewerContext::new(5, Role::Admin);
        assert!(owner.ensure_owner_or_admin(3).is_ok());
        assert!(other.ensure_owner_or_admin(3).is_err());
        assert!(admin.ensure_owner_or_admin(3).is_ok());
    }
}
