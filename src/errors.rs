//! Error taxonomy shared by the cache, store, reliability and reconciliation layers.
//!
//! `CoreError` models the error *kinds* of the design rather than a type per
//! failure site: callers match on the variant to decide whether to retry,
//! surface a localized message, or propagate to the scheduler loop.

use std::fmt;

#[derive(Debug, Clone)]
pub enum CoreError {
    Validation(String),
    NotFound(String),
    Forbidden(String),
    TransientNetwork(String),
    CircuitOpen,
    StoreTimeout(String),
    StoreConstraint(String),
    Cancelled,
    FatalConfig(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Validation(msg) => write!(f, "validation error: {msg}"),
            CoreError::NotFound(msg) => write!(f, "not found: {msg}"),
            CoreError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            CoreError::TransientNetwork(msg) => write!(f, "transient network error: {msg}"),
            CoreError::CircuitOpen => write!(f, "circuit breaker is open"),
            CoreError::StoreTimeout(msg) => write!(f, "store timeout: {msg}"),
            CoreError::StoreConstraint(msg) => write!(f, "store constraint violation: {msg}"),
            CoreError::Cancelled => write!(f, "operation cancelled"),
            CoreError::FatalConfig(msg) => write!(f, "fatal configuration error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl CoreError {
    /// Errors the reliability envelope (§4.D) should retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::TransientNetwork(_) | CoreError::StoreTimeout(_)
        )
    }

    /// Classify a raw sqlx/transport error string into a taxonomy kind.
    ///
    /// Used at the store gateway boundary where sqlx only exposes loosely
    /// typed errors; message sniffing mirrors `RpcError::categorize`.
    pub fn categorize(err: &str) -> Self {
        let lowered = err.to_ascii_lowercase();
        if lowered.contains("timeout") || lowered.contains("timed out") {
            CoreError::StoreTimeout(err.to_string())
        } else if lowered.contains("duplicate")
            || lowered.contains("unique constraint")
            || lowered.contains("foreign key")
        {
            CoreError::StoreConstraint(err.to_string())
        } else if lowered.contains("connection")
            || lowered.contains("network")
            || lowered.contains("dns")
            || lowered.contains("reset")
        {
            CoreError::TransientNetwork(err.to_string())
        } else {
            CoreError::StoreTimeout(err.to_string())
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => CoreError::StoreTimeout("pool exhausted".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                CoreError::StoreConstraint(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                CoreError::StoreConstraint(db_err.message().to_string())
            }
            other => CoreError::categorize(&other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorizes_timeout_as_transient_kind() {
        let err = CoreError::categorize("connection timed out after 15s");
        assert!(matches!(err, CoreError::StoreTimeout(_)));
    }

    #[test]
    fn categorizes_duplicate_key_as_constraint() {
        let err = CoreError::categorize("duplicate key value violates unique constraint");
        assert!(matches!(err, CoreError::StoreConstraint(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn transient_network_is_retryable() {
        let err = CoreError::TransientNetwork("connection reset".to_string());
        assert!(err.is_transient());
    }

    #[test]
    fn circuit_open_is_not_retryable_by_the_envelope() {
        assert!(!CoreError::CircuitOpen.is_transient());
    }
}
