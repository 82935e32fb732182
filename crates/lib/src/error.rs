pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Store error: {message}")]
    Store { message: String },
    #[error("Not found: {message}")]
    NotFound { message: String },
    #[error("Invalid criteria: {message}")]
    InvalidCriteria { message: String },
    #[error(transparent)]
    Config(#[from] crate::config::Error),
}

impl Error {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidCriteria {
            message: message.into(),
        }
    }
}
