pub mod jwt;
pub mod markdown;
pub mod password;

pub use jwt::encode_access_token;
pub use markdown::{excerpt, render_markdown};
pub use password::{generate_temporary_password, hash_password, verify_password};
