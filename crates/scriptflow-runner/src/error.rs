//! Error types for the scriptflow-runner crate.

use std::path::PathBuf;

use scriptflow_intent::IntentError;
use scriptflow_kernel::KernelError;

use crate::form::FormErrors;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Errors returned by the flow runner.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// `submit_form` was called while no form is waiting.
    #[error("no form is waiting for submission")]
    NoPendingForm,

    /// The submitted values failed validation; the run is unchanged.
    #[error("form rejected: {}", .0.summary)]
    Validation(FormErrors),

    /// The runner has been shut down.
    #[error("runner has been shut down")]
    ShutDown,

    /// The configuration file could not be parsed or holds invalid values.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Intent(#[from] IntentError),
}
