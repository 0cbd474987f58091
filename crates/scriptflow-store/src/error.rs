//! Error types for the scriptflow-store crate.
//!
//! All store operations return [`StoreError`] via [`StoreResult`].

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while writing to a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store refused the append.
    #[error("append rejected: {reason}")]
    AppendRejected { reason: String },

    /// The referenced step does not exist in the session's timeline.
    #[error("step {step_id} not found in session {session_id}")]
    StepNotFound { session_id: String, step_id: String },

    /// The store no longer accepts writes.
    #[error("store is closed")]
    Closed,
}
