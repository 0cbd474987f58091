//! Kernel error types.
//!
//! Every kernel subsystem surfaces errors through [`KernelError`].  Each
//! variant carries enough context for callers to decide how to handle the
//! failure without inspecting opaque strings.

/// Unified error type for the scriptflow kernel.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    // -- Timer errors -------------------------------------------------------
    /// The registry was torn down and will not accept new timers.
    #[error("timer registry is torn down")]
    RegistryTornDown,

    /// A timer was cancelled before its deadline elapsed.
    #[error("timer `{label}` was cancelled")]
    TimerCancelled {
        /// The label the timer was registered with.
        label: String,
    },

    /// No tokio runtime was available when the registry was created.
    #[error("no tokio runtime available")]
    NoRuntime,

    // -- Router errors ------------------------------------------------------
    /// Building the phrase automaton failed.
    #[error("router build error: {reason}")]
    RouterBuild { reason: String },
}

/// Convenience alias used throughout the kernel crate.
pub type Result<T> = std::result::Result<T, KernelError>;
