//! Step tracking: the progress timeline shown next to a conversation.
//!
//! Each system message of a run is a [`Step`]: created `pending` when the
//! flow matches, then moved to `ok` when its message is appended (or
//! `error` when the append fails).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Identifier of a tracked step.
pub type StepId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Ok,
    Error,
}

/// One entry in a session's step timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub label: String,
    pub state: StepState,
    pub updated_at: DateTime<Utc>,
}

impl Step {
    /// A new pending step.
    pub fn pending(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            label: label.into(),
            state: StepState::Pending,
            updated_at: Utc::now(),
        }
    }
}

/// Destination for step lifecycle events.
#[async_trait]
pub trait StepTracker: Send + Sync {
    /// Record a new step in `session_id`'s timeline.
    async fn track_step(&self, session_id: &str, step: Step) -> StoreResult<StepId>;

    /// Move an existing step to `state`.
    async fn update_step(&self, session_id: &str, step_id: StepId, state: StepState)
    -> StoreResult<()>;
}

// ---------------------------------------------------------------------------
// StepLog
// ---------------------------------------------------------------------------

/// In-memory [`StepTracker`] keeping one timeline per session.
#[derive(Debug, Clone, Default)]
pub struct StepLog {
    timelines: Arc<DashMap<String, Vec<Step>>>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The steps of `session_id` in creation order.
    pub fn timeline(&self, session_id: &str) -> Vec<Step> {
        self.timelines
            .get(session_id)
            .map(|steps| steps.value().clone())
            .unwrap_or_default()
    }

    /// Number of steps of `session_id` currently in `state`.
    pub fn count_in_state(&self, session_id: &str, state: StepState) -> usize {
        self.timelines
            .get(session_id)
            .map(|steps| steps.iter().filter(|s| s.state == state).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl StepTracker for StepLog {
    async fn track_step(&self, session_id: &str, step: Step) -> StoreResult<StepId> {
        let id = step.id;
        debug!(session_id, step_id = %id, label = %step.label, "step tracked");
        self.timelines
            .entry(session_id.to_string())
            .or_default()
            .push(step);
        Ok(id)
    }

    async fn update_step(
        &self,
        session_id: &str,
        step_id: StepId,
        state: StepState,
    ) -> StoreResult<()> {
        let not_found = || StoreError::StepNotFound {
            session_id: session_id.to_string(),
            step_id: step_id.to_string(),
        };

        let mut steps = self.timelines.get_mut(session_id).ok_or_else(not_found)?;
        let step = steps
            .iter_mut()
            .find(|s| s.id == step_id)
            .ok_or_else(not_found)?;

        step.state = state;
        step.updated_at = Utc::now();
        debug!(session_id, %step_id, ?state, "step updated");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
