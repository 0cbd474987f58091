//! # scriptflow-store
//!
//! The collaborators a conversation runner writes to.
//!
//! Everything here is append-only from the runner's point of view: the
//! runner emits messages and step transitions but never reads them back to
//! drive control flow.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  MessageSink     (trait)  ← MessageLog        │
//! │  StepTracker     (trait)  ← StepLog           │
//! │  SessionProvider (trait)  ← FixedSession      │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The in-memory implementations are what the demo host and the tests use;
//! a real deployment would put its own storage behind the traits.

pub mod error;
pub mod message;
pub mod session;
pub mod steps;

// ── re-exports ───────────────────────────────────────────────────────

pub use error::{StoreError, StoreResult};
pub use message::{Message, MessageLog, MessageSink, Sender};
pub use session::{FixedSession, SessionProvider};
pub use steps::{Step, StepId, StepLog, StepState, StepTracker};
