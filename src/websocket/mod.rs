pub mod hub;
pub mod push;
