use marquee_core::BookingError;

/// Failures raised inside the adapters before they are folded into the
/// domain taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("mail error: {0}")]
    Mail(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Domain(#[from] BookingError),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Domain(e) => e,
            StoreError::Mail(msg) => BookingError::GatewayFailure(msg),
            other => BookingError::storage(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_pass_through_unchanged() {
        let err: BookingError = StoreError::Domain(BookingError::NotFound("show".into())).into();
        assert_eq!(err, BookingError::NotFound("show".into()));
    }

    #[test]
    fn test_infrastructure_errors_become_storage() {
        let err: BookingError = StoreError::Corrupt("bad seat".into()).into();
        assert!(matches!(err, BookingError::Storage(msg) if msg.contains("bad seat")));
    }
}
