//! # scriptflow-runner
//!
//! Plays scripted conversation flows with realistic pacing.
//!
//! A [`FlowRunner`] owns one session's [`RunState`]: it matches user text
//! against a [`FlowCatalog`](scriptflow_intent::FlowCatalog), plays the
//! matched flow's system messages, the assistant's response, an optional
//! form round-trip, final messages and approval / notification cascades,
//! then returns to idle.  Every delay is a timer in the session's
//! [`TimerRegistry`](scriptflow_kernel::TimerRegistry), so tearing the
//! session down stops all of it at once.
//!
//! ```text
//! Idle ─▶ Matched ─▶ PlayingSystemMessages ─▶ AwaitingAgentResponse
//!                                               │
//!                        ┌──────────────────────┴─────────────┐
//!                        ▼                                    ▼
//!                   AwaitingForm                      FastPathConfirmed
//!                        └──────────────┬─────────────────────┘
//!                                       ▼
//!      PlayingFinalMessages ─▶ ApprovalCascade ─▶ NotificationCascade ─▶ Idle
//! ```

pub mod config;
pub mod error;
pub mod form;
pub mod runner;
pub mod state;

// ── re-exports ───────────────────────────────────────────────────────

pub use config::{MIN_SPEED, PacingConfig, RunnerConfig};
pub use error::{Result, RunnerError};
pub use form::{DateRange, FieldError, FormErrors, confirmation_text, day_count, validate};
pub use runner::{Collaborators, FlowRunner};
pub use state::{RunState, Stage};
