// promobot-common/src/error.rs

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found error: {0}")]
    NotFound(String),

    #[error("Already exists error: {0}")]
    AlreadyExists(String),

    #[error("Invalid argument error: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout error: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),
}

impl Error {
    /// The message shown to an end user. Domain failures carry their own
    /// wording; everything else is surfaced generically and only the log
    /// gets the detail.
    pub fn user_message(&self) -> String {
        match self {
            Error::NotFound(msg)
            | Error::AlreadyExists(msg)
            | Error::InvalidArgument(msg) => msg.clone(),
            _ => "Internal bot error".to_string(),
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
