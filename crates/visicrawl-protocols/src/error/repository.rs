//! Persistence errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Run not found: {0}")]
    RunNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "Storage error: disk full");

        let err = RepositoryError::RunNotFound("abc".to_string());
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_repository_error_from_serde() {
        let serde_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err = RepositoryError::from(serde_err);
        assert!(err.to_string().starts_with("Serialization error"));
    }
}
