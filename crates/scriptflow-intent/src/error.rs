//! Intent crate error types.
//!
//! Catalog loading, flow validation and matcher construction surface
//! errors through [`IntentError`].

use std::path::PathBuf;

/// Unified error type for the intent crate.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    // -- Catalog errors ------------------------------------------------------
    /// A catalog document could not be deserialized.
    #[error("failed to parse flow catalog: {0}")]
    CatalogParse(#[from] toml::de::Error),

    /// A catalog file could not be read.
    #[error("failed to read flow catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog declares no flows.
    #[error("flow catalog is empty")]
    EmptyCatalog,

    /// Two flows share the same id.
    #[error("duplicate flow id: {flow_id}")]
    DuplicateFlow { flow_id: String },

    /// A flow definition violates a structural rule.
    #[error("invalid flow `{flow_id}`: {reason}")]
    InvalidFlow { flow_id: String, reason: String },

    // -- Extraction errors ---------------------------------------------------
    /// An extraction pattern or vocabulary failed to compile.
    #[error("invalid extraction pattern: {reason}")]
    Pattern { reason: String },

    // -- Upstream crate errors -----------------------------------------------
    /// An error propagated from the kernel crate.
    #[error("kernel error: {0}")]
    Kernel(#[from] scriptflow_kernel::KernelError),
}

/// Convenience alias used throughout the intent crate.
pub type Result<T> = std::result::Result<T, IntentError>;
