//! scriptflow runtime kernel.
//!
//! The primitives every scripted conversation is built on:
//!
//! - **[`timers`]** -- [`TimerRegistry`], the bookkeeping for every delayed
//!   effect of a session.  All outstanding timers are cancelled together
//!   on teardown through a shared [`tokio_util::sync::CancellationToken`].
//! - **[`router`]** -- [`PhraseRouter`], a case-insensitive substring router
//!   backed by an [`aho_corasick`] automaton where the lowest declaration
//!   rank wins.
//! - **[`error`]** -- Unified kernel error types via [`thiserror`].
//!
//! All public types are `Send + Sync` and meant to run on a tokio runtime.

pub mod error;
pub mod router;
pub mod timers;

pub use error::{KernelError, Result};
pub use router::{PhraseRouter, RouteMatch};
pub use timers::{PendingTimer, TimerHandle, TimerId, TimerRegistry};
