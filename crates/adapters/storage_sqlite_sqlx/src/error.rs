//! Storage-specific error type wrapping sqlx errors.

use coolhub_domain::error::CoolHubError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to (de)serialize a stored JSON value.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for CoolHubError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_into_storage_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CoolHubError = StorageError::from(json_err).into();
        assert!(matches!(err, CoolHubError::Storage(_)));
    }
}
