//! Run configuration for the scraper
//!
//! Everything arrives as command-line flags; nothing is read from the
//! environment or from config files.

/// Default session name when --session is not given.
pub const DEFAULT_SESSION_NAME: &str = "telegram_session";

/// Default trailing window in days.
pub const DEFAULT_DAYS: i64 = 30;

/// Connection and authorization settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_id: i32,
    pub api_hash: String,
    pub session_name: String,
    pub phone_or_token: Option<String>,
}

/// How to sign in when the session is not yet authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod<'a> {
    /// Phone number: request a login code and read it from stdin.
    Phone(&'a str),
    /// Bot token (contains a `:`): sign in directly.
    BotToken(&'a str),
    /// Nothing supplied; the existing session must already be signed in.
    SessionOnly,
}

impl Config {
    /// Path of the SQLite session file for this session name.
    pub fn session_file(&self) -> String {
        format!("{}.session", self.session_name)
    }

    /// Path of the advisory lock file guarding the session.
    pub fn lock_file(&self) -> String {
        format!("{}.lock", self.session_name)
    }

    /// Classify --phone-or-token. Bot tokens always contain a colon
    /// (`<bot_id>:<secret>`); phone numbers never do.
    pub fn auth_method(&self) -> AuthMethod<'_> {
        match self.phone_or_token.as_deref() {
            Some(value) if value.contains(':') => AuthMethod::BotToken(value),
            Some(value) => AuthMethod::Phone(value),
            None => AuthMethod::SessionOnly,
        }
    }
}
