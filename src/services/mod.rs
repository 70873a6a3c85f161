pub mod admin;
pub mod audit;
pub mod auth;
pub mod bootstrap_admin;
pub mod cache;
pub mod cascade;
pub mod category;
pub mod comment;
pub mod counter;
pub mod follow;
pub mod interaction;
pub mod message;
pub mod notification;
pub mod post;
pub mod resource;
pub mod user;
pub mod visibility;
