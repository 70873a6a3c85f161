pub mod admin_log;
pub mod category;
pub mod comment;
pub mod favorite;
pub mod follow;
pub mod like;
pub mod message;
pub mod notification;
pub mod post;
pub mod resource;
pub mod user;

pub use admin_log::{Entity as AdminLog, Model as AdminLogModel};
pub use category::{Entity as Category, Model as CategoryModel};
pub use comment::{Entity as Comment, Model as CommentModel};
pub use favorite::Entity as Favorite;
pub use follow::Entity as Follow;
pub use like::{Entity as Like, LikeTarget};
pub use message::{Entity as Message, Model as MessageModel};
pub use notification::{Entity as Notification, Model as NotificationModel};
pub use post::{Entity as Post, Model as PostModel};
pub use resource::{Entity as Resource, Model as ResourceModel};
pub use user::{Entity as User, Model as UserModel, Role, UserStatus};
