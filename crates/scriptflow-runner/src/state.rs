//! Observable run state.

use std::fmt;
use std::sync::Arc;

use scriptflow_intent::{FieldSpec, Flow, FormData};
use uuid::Uuid;

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Stage {
    #[default]
    Idle,
    Matched,
    PlayingSystemMessages,
    AwaitingAgentResponse,
    AwaitingForm,
    FastPathConfirmed,
    PlayingFinalMessages,
    ApprovalCascade,
    NotificationCascade,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Matched => "matched",
            Self::PlayingSystemMessages => "playing_system_messages",
            Self::AwaitingAgentResponse => "awaiting_agent_response",
            Self::AwaitingForm => "awaiting_form",
            Self::FastPathConfirmed => "fast_path_confirmed",
            Self::PlayingFinalMessages => "playing_final_messages",
            Self::ApprovalCascade => "approval_cascade",
            Self::NotificationCascade => "notification_cascade",
        };
        f.write_str(name)
    }
}

/// Snapshot of a session's run.
///
/// Only the runner mutates it; callers receive clones.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub active_flow: Option<Arc<Flow>>,
    pub stage: Stage,
    /// Mutual-exclusion flag: triggers arriving while set are dropped.
    pub is_processing: bool,
    pub form_data: FormData,
    pub show_typing_indicator: bool,
    /// Identifies the current run; `None` when idle.
    pub run_id: Option<Uuid>,
}

impl RunState {
    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Idle
    }

    /// The fields of the form waiting for submission, if any.
    pub fn pending_form(&self) -> Option<&[FieldSpec]> {
        if self.stage != Stage::AwaitingForm {
            return None;
        }
        self.active_flow.as_ref()?.form_fields()
    }

    /// Whether this state belongs to `run_id`.
    pub(crate) fn is_run(&self, run_id: Uuid) -> bool {
        self.run_id == Some(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptflow_intent::FlowCatalog;

    #[test]
    fn default_state_is_idle() {
        let state = RunState::default();
        assert!(state.is_idle());
        assert!(!state.is_processing);
        assert!(state.active_flow.is_none());
        assert!(state.pending_form().is_none());
    }

    #[test]
    fn pending_form_only_while_awaiting_form() {
        let flow = Arc::clone(FlowCatalog::builtin().get("time-off").unwrap());
        let mut state = RunState {
            active_flow: Some(flow),
            stage: Stage::AwaitingAgentResponse,
            ..RunState::default()
        };
        assert!(state.pending_form().is_none());

        state.stage = Stage::AwaitingForm;
        assert_eq!(state.pending_form().unwrap().len(), 4);
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::ApprovalCascade.to_string(), "approval_cascade");
    }
}
