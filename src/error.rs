use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuoteError>;

#[derive(Debug, Error)]
pub enum QuoteError {
    /// a required field was empty after trimming.
    #[error("the quote {0} must not be empty")]
    Validation(&'static str),

    #[error("invalid import format: {0}")]
    ImportFormat(String),

    #[error("remote request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("remote request timed out after {0:?}")]
    Timeout(Duration),

    /// persisted data could not be decoded. only ever logged; callers fall back to defaults.
    #[error("persisted data is unreadable: {0}")]
    StorageRead(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QuoteError {
    pub fn import_format(message: impl Into<String>) -> Self {
        Self::ImportFormat(message.into())
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    /// whether the error is the user's fault and should be shown to them as-is.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::ImportFormat(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        assert!(QuoteError::Timeout(Duration::from_secs(1)).is_network());
        assert!(!QuoteError::Validation("text").is_network());
        assert!(QuoteError::Validation("text").is_user_facing());
        assert!(QuoteError::import_format("nope").is_user_facing());
        assert!(!QuoteError::StorageRead("bad".into()).is_user_facing());
    }

    #[test]
    fn validation_message_names_the_field() {
        assert_eq!(
            QuoteError::Validation("category").to_string(),
            "the quote category must not be empty"
        );
    }
}
