pub mod admin;
pub mod auth;
pub mod category;
pub mod comment;
pub mod follow;
pub mod interaction;
pub mod message;
pub mod notification;
pub mod post;
pub mod resource;
pub mod user;

pub use auth::*;
