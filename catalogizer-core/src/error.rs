use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Permanent failure: {0}")]
    Permanent(String),

    #[error("No confident match: {0}")]
    Unrecognized(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller may retry the failed operation.
    ///
    /// `Transient` covers storage-client and external-provider timeouts;
    /// `Conflict` covers optimistic-concurrency mismatches. Everything else
    /// is terminal and should be surfaced verbatim.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Conflict(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // Map "no rows" to NotFound
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            sqlx::Error::PoolTimedOut => {
                Error::Transient("Database connection pool timed out".to_string())
            }
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                match code.as_ref() {
                    // PostgreSQL unique_violation
                    "23505" => {
                        let detail = db_err.message().to_string();
                        if detail.contains("storage_roots") {
                            Error::Conflict("Storage root already registered".to_string())
                        } else if detail.contains("directory_analyses") {
                            Error::Conflict("Directory already analyzed".to_string())
                        } else {
                            Error::Conflict("Resource already exists".to_string())
                        }
                    }
                    // PostgreSQL serialization_failure / deadlock_detected
                    "40001" | "40P01" => {
                        Error::Conflict("Concurrent update detected".to_string())
                    }
                    // PostgreSQL foreign_key_violation
                    "23503" => Error::NotFound("Referenced resource not found".to_string()),
                    // PostgreSQL check_violation
                    "23514" => Error::Invalid("Constraint check failed".to_string()),
                    // PostgreSQL not_null_violation
                    "23502" => Error::Invalid("Required field is missing".to_string()),
                    _ => Error::Database(err),
                }
            }
            _ => Error::Database(err),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Error::Transient(format!("External request failed: {err}"))
        } else {
            Error::Permanent(format!("External request failed: {err}"))
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
