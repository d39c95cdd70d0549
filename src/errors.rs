use sea_orm::error::{DbErr, SqlErr};
use sea_orm::TransactionError;

/// Error taxonomy for every engine operation.
///
/// Validation failures are raised before a transaction opens; store-level
/// constraint violations are normalized into `Conflict`; everything the
/// engine cannot classify is carried as `DatabaseError`/`Other` with full
/// context and never swallowed.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Insufficient stock: requested {requested}, available {available}, short {}", .requested - .available)]
    InsufficientStock { requested: i64, available: i64 },

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ServiceError {
    /// Normalizes a store error, mapping constraint violations to `Conflict`
    /// so callers never have to match on backend-specific `DbErr` shapes.
    pub fn db_error(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => {
                ServiceError::Conflict(format!("unique constraint violated: {msg}"))
            }
            Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
                ServiceError::Conflict(format!("foreign key constraint violated: {msg}"))
            }
            _ => ServiceError::DatabaseError(err),
        }
    }

    /// Units missing from an `InsufficientStock` failure, if that is what
    /// this error is.
    pub fn shortfall(&self) -> Option<i64> {
        match self {
            ServiceError::InsufficientStock {
                requested,
                available,
            } => Some(requested - available),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_mentions_shortfall() {
        let err = ServiceError::InsufficientStock {
            requested: 4,
            available: 2,
        };
        assert_eq!(err.shortfall(), Some(2));
        assert!(err.to_string().contains("short 2"));
    }

    #[test]
    fn validation_errors_convert() {
        let errors = validator::ValidationErrors::new();
        let err: ServiceError = errors.into();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }
}
