//! Error types for the PostgreSQL store collaborator.

use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Errors from store-facing operations.
///
/// `Connection` and `Constraint` are classified at the call sites that can
/// produce them; everything else surfaces as the underlying driver error.
/// All variants are fatal to the loop that hits them — the loops' only
/// recoverable conditions come from the corpus and the watermark file.
#[derive(Error, Debug)]
pub enum StoreError {
    /// PostgreSQL query or protocol error.
    #[error("PostgreSQL error: {0}")]
    PostgreSQL(#[from] tokio_postgres::Error),

    /// Connection could not be established or verified.
    #[error("connection error: {0}")]
    Connection(String),

    /// A constraint rejected the write.
    #[error("constraint violation: {0}")]
    Constraint(String),
}

impl StoreError {
    /// Wrap a driver error, classifying constraint violations.
    pub(crate) fn from_query(e: tokio_postgres::Error) -> StoreError {
        let constraint = e.code().is_some_and(|code| {
            *code == SqlState::UNIQUE_VIOLATION
                || *code == SqlState::FOREIGN_KEY_VIOLATION
                || *code == SqlState::CHECK_VIOLATION
                || *code == SqlState::NOT_NULL_VIOLATION
        });
        if constraint {
            StoreError::Constraint(e.to_string())
        } else {
            StoreError::PostgreSQL(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_render_their_kind() {
        let e = StoreError::Connection("refused".to_string());
        assert_eq!(e.to_string(), "connection error: refused");

        let e = StoreError::Constraint("duplicate key".to_string());
        assert_eq!(e.to_string(), "constraint violation: duplicate key");
    }
}
