//! Error types for the Telegram scraper

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Session is locked by another process")]
    SessionLocked,

    #[error("Failed to acquire session lock: {0}")]
    LockError(String),

    #[error("Telegram API error: {0}")]
    TelegramError(String),

    #[error("Unable to access chat '{chat}': {reason}")]
    ChatUnavailable { chat: String, reason: String },

    #[error("Authorization required: session is not signed in and no --phone-or-token was given")]
    AuthorizationRequired,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<grammers_client::InvocationError> for Error {
    fn from(err: grammers_client::InvocationError) -> Self {
        Error::TelegramError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
