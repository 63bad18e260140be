// src/error.rs

/// Errors from the message store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The durable medium rejected or could not accept the operation.
    /// Callers must not broadcast a message whose append failed.
    #[error("message store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Errors from chat protocol operations. All of these are connection-local:
/// they are reported to the originating connection only and never affect
/// other members of a room. Operations on unknown connections are a silent
/// no-op, not an error (disconnect races are expected).
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Missing or malformed identifiers on a join or send. No state change.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The store failed; no broadcast occurred, membership is unaffected.
    #[error(transparent)]
    Store(#[from] StoreError),
}
