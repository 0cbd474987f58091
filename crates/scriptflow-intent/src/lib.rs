//! Flow catalog, trigger matching and entity extraction for scriptflow.
//!
//! This crate provides:
//!
//! - **Flow model**: immutable scripted-interaction definitions via
//!   [`flow::Flow`], with a closed [`flow::AgentResponse`] union.
//! - **Catalog**: the built-in flows and TOML loading via
//!   [`catalog::FlowCatalog`].
//! - **Trigger matching**: first-declared-flow-wins substring matching via
//!   [`matcher::TriggerMatcher`].
//! - **Entity extraction**: date and leave-type scanning via
//!   [`extractor::EntityExtractor`], feeding the pluggable
//!   [`fast_path::FastPathPredicate`].

pub mod catalog;
pub mod error;
pub mod extractor;
pub mod fast_path;
pub mod flow;
pub mod matcher;

pub use catalog::FlowCatalog;
pub use error::{IntentError, Result};
pub use extractor::{Entities, EntityExtractor};
pub use fast_path::{DisabledFastPath, ExtractorFastPath, FastPathPredicate};
pub use flow::{
    ActionKind, AgentResponse, Cascade, FastPathBinding, FieldKind, FieldSpec, Flow, FormData,
    render_template,
};
pub use matcher::TriggerMatcher;
