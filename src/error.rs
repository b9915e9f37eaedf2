/// Unified error type for the token store.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    // ── Lookup ──────────────────────────────────────────────────────────
    #[error("{0} not found")]
    NotFound(String),

    // ── Row mapping ─────────────────────────────────────────────────────
    #[error("Invalid token row: {0}")]
    InvalidRow(String),

    // ── Expiry sweep ────────────────────────────────────────────────────
    #[error("Invalid sweep policy: {0}")]
    InvalidPolicy(String),

    // ── Storage ─────────────────────────────────────────────────────────
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl TokenError {
    /// True for a lookup miss. Callers treat it as "not currently valid".
    pub fn is_not_found(&self) -> bool {
        matches!(self, TokenError::NotFound(_))
    }
}

impl From<sqlx::Error> for TokenError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error: {e}");
        TokenError::Database(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinguishable() {
        assert!(TokenError::NotFound("token".into()).is_not_found());
        assert!(!TokenError::Conflict("token".into()).is_not_found());
        assert_eq!(TokenError::NotFound("token".into()).to_string(), "token not found");
    }

    #[test]
    fn test_database_error_keeps_source() {
        let err = TokenError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, TokenError::Database(sqlx::Error::PoolTimedOut)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
