use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("forbidden")]
    Forbidden,

    #[error("invalid payload: {0}")]
    Validation(String),

    #[error("cannot decrypt payload: {0}")]
    Decrypt(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Error::AccessDenied(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
