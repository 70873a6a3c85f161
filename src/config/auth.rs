use std::env;

#[derive(Debug, Clone, Copy)]
pub struct AuthConfig {
    /// New accounts start `pending` and cannot log in until an admin approves them.
    pub require_registration_review: bool,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self {
            require_registration_review: super::parse_bool_env(
                "REQUIRE_REGISTRATION_REVIEW",
                false,
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapSuperAdminConfig {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl BootstrapSuperAdminConfig {
    /// Returns None unless bootstrapping is enabled and fully configured.
    pub fn from_env() -> Option<Self> {
        if !super::parse_bool_env("BOOTSTRAP_SUPER_ADMIN_ENABLED", false) {
            return None;
        }

        Some(Self {
            username: env::var("BOOTSTRAP_SUPER_ADMIN_USERNAME").ok()?,
            email: env::var("BOOTSTRAP_SUPER_ADMIN_EMAIL").ok()?,
            password: env::var("BOOTSTRAP_SUPER_ADMIN_PASSWORD").ok()?,
        })
    }
}
