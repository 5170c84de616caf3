use subtle::ConstantTimeEq;

pub const DEFAULT_DATABASE: &str = "data/microblog.db";
pub const DEFAULT_UPLOAD_FOLDER: &str = "data/files";
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 2] = ["txt", "pdf"];
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "default";
pub const DEFAULT_SECRET_KEY: &str = "development key";
// 64 MiB
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 64 * 1024 * 1024;
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5006;

/// Outcome of checking a login attempt against the configured admin account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Accepted,
    InvalidUsername,
    InvalidPassword,
}

impl LoginOutcome {
    /// Message shown on the login form, `None` when the login succeeded.
    pub fn error_message(&self) -> Option<&'static str> {
        match self {
            LoginOutcome::Accepted => None,
            LoginOutcome::InvalidUsername => Some("Invalid username"),
            LoginOutcome::InvalidPassword => Some("Invalid password"),
        }
    }
}

/// The single admin account allowed to post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn check(&self, username: &str, password: &str) -> LoginOutcome {
        if !bool::from(self.username.as_bytes().ct_eq(username.as_bytes())) {
            return LoginOutcome::InvalidUsername;
        }
        if !bool::from(self.password.as_bytes().ct_eq(password.as_bytes())) {
            return LoginOutcome::InvalidPassword;
        }
        LoginOutcome::Accepted
    }
}
