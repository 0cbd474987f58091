//! Trigger matcher: selects the flow a piece of user text starts.
//!
//! Every trigger of every flow is compiled into one
//! [`PhraseRouter`](scriptflow_kernel::PhraseRouter) whose rank is the
//! flow's declaration index.  The lowest rank among all hits wins, which is
//! exactly "scan flows in declaration order, return the first with any
//! matching trigger".  Matching is side-effect free.

use std::sync::Arc;

use scriptflow_kernel::PhraseRouter;
use tracing::debug;

use crate::catalog::FlowCatalog;
use crate::error::Result;
use crate::flow::Flow;

/// Resolves user text to the first matching flow of a catalog.
#[derive(Debug)]
pub struct TriggerMatcher {
    catalog: Arc<FlowCatalog>,
    router: PhraseRouter,
}

impl TriggerMatcher {
    /// Compile the triggers of `catalog`.
    pub fn new(catalog: Arc<FlowCatalog>) -> Result<Self> {
        let phrases = catalog
            .iter()
            .enumerate()
            .flat_map(|(rank, flow)| flow.triggers.iter().map(move |t| (t.as_str(), rank)));
        let router = PhraseRouter::build(phrases)?;

        Ok(Self { catalog, router })
    }

    /// The flow `text` triggers, if any.
    pub fn match_flow(&self, text: &str) -> Option<Arc<Flow>> {
        let Some(hit) = self.router.route(text) else {
            debug!(text, "no trigger matched");
            return None;
        };

        let flow = self.catalog.at(hit.rank)?;
        debug!(flow_id = %flow.id, phrase = %hit.phrase, "trigger matched");
        Some(Arc::clone(flow))
    }

    /// The catalog this matcher was compiled from.
    pub fn catalog(&self) -> &Arc<FlowCatalog> {
        &self.catalog
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::AgentResponse;

    fn matcher() -> TriggerMatcher {
        TriggerMatcher::new(Arc::new(FlowCatalog::builtin())).unwrap()
    }

    #[test]
    fn clock_in_phrase_matches_clock_in_flow() {
        let flow = matcher().match_flow("I want to clock in").unwrap();
        assert_eq!(flow.id, "clock-in");
    }

    #[test]
    fn matching_ignores_case() {
        let flow = matcher().match_flow("TIME OFF please").unwrap();
        assert_eq!(flow.id, "time-off");
    }

    #[test]
    fn unrelated_text_matches_nothing() {
        assert!(matcher().match_flow("what's for lunch?").is_none());
    }

    #[test]
    fn first_declared_flow_wins() {
        // Mentions both a payslip and a day off; time-off is declared first.
        let flow = matcher()
            .match_flow("check my payslip before my day off")
            .unwrap();
        assert_eq!(flow.id, "time-off");
    }

    #[test]
    fn declaration_order_decides_between_custom_flows() {
        let a = Flow::new("a", "A", AgentResponse::Confirmation { body: "a".into() })
            .with_triggers(["report"]);
        let b = Flow::new("b", "B", AgentResponse::Confirmation { body: "b".into() })
            .with_triggers(["expense report"]);
        let catalog = Arc::new(FlowCatalog::from_flows(vec![a, b]).unwrap());
        let matcher = TriggerMatcher::new(catalog).unwrap();

        assert_eq!(matcher.match_flow("file an expense report").unwrap().id, "a");
    }
}
