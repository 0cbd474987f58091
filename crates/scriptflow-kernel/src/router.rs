//! Ranked phrase router.
//!
//! Resolves free text to the lowest-ranked registered phrase it contains.
//! Matching is a case-insensitive substring search over all phrases at once
//! using an [`aho_corasick`] automaton, so the cost does not grow with the
//! number of phrases per handler.
//!
//! Ranks encode declaration order: when several phrases occur in the text,
//! the phrase with the smallest rank wins regardless of where it occurs.
//! This gives the same answer as scanning the handlers in declaration order
//! and returning the first one with any matching phrase.
//!
//! # Example
//!
//! ```rust
//! # use scriptflow_kernel::router::PhraseRouter;
//! let router = PhraseRouter::build([("time off", 0), ("clock in", 1)]).unwrap();
//!
//! let hit = router.route("Can I clock in before my TIME OFF starts?").unwrap();
//! assert_eq!(hit.rank, 0);
//! assert_eq!(hit.phrase, "time off");
//! ```

use aho_corasick::AhoCorasick;

use crate::error::{KernelError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A successful route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Rank of the matched phrase (its handler's declaration index).
    pub rank: usize,
    /// The lower-cased phrase that matched.
    pub phrase: String,
    /// Byte offset of the match within the lower-cased input.
    pub start: usize,
}

// ---------------------------------------------------------------------------
// PhraseRouter
// ---------------------------------------------------------------------------

/// Case-insensitive substring router with rank-ordered resolution.
///
/// The router is immutable once built and **not** `Clone` because it holds
/// a compiled automaton.  Wrap in `Arc` if shared access is needed.
#[derive(Debug)]
pub struct PhraseRouter {
    /// Lower-cased phrases and their ranks, in registration order.
    phrases: Vec<(String, usize)>,

    /// `None` when no non-empty phrase was registered.
    automaton: Option<AhoCorasick>,
}

impl PhraseRouter {
    /// Build a router from `(phrase, rank)` pairs.
    ///
    /// Phrases are lower-cased and trimmed; blank phrases are skipped since
    /// they would match every input.
    pub fn build<I, S>(phrases: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: AsRef<str>,
    {
        let mut kept = Vec::new();
        for (phrase, rank) in phrases {
            let phrase = phrase.as_ref().trim().to_lowercase();
            if phrase.is_empty() {
                tracing::warn!(rank, "skipping blank phrase");
                continue;
            }
            kept.push((phrase, rank));
        }

        let automaton = if kept.is_empty() {
            None
        } else {
            let patterns: Vec<&str> = kept.iter().map(|(p, _)| p.as_str()).collect();
            let ac = AhoCorasick::new(&patterns).map_err(|e| KernelError::RouterBuild {
                reason: e.to_string(),
            })?;
            tracing::trace!(count = patterns.len(), "aho-corasick automaton built");
            Some(ac)
        };

        Ok(Self {
            phrases: kept,
            automaton,
        })
    }

    /// Route `text` to the lowest-ranked phrase it contains.
    ///
    /// Ties on rank go to the earliest occurrence.
    pub fn route(&self, text: &str) -> Option<RouteMatch> {
        let ac = self.automaton.as_ref()?;
        let lowered = text.to_lowercase();

        let mut best: Option<(usize, usize, usize)> = None; // (rank, start, pattern)
        for mat in ac.find_overlapping_iter(&lowered) {
            let idx = mat.pattern().as_usize();
            let rank = self.phrases[idx].1;
            let candidate = (rank, mat.start(), idx);
            if best.is_none_or(|b| (candidate.0, candidate.1) < (b.0, b.1)) {
                best = Some(candidate);
            }
        }

        let (rank, start, idx) = best?;
        Some(RouteMatch {
            rank,
            phrase: self.phrases[idx].0.clone(),
            start,
        })
    }

    /// Number of registered (non-blank) phrases.
    pub fn phrase_count(&self) -> usize {
        self.phrases.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_is_case_insensitive() {
        let router = PhraseRouter::build([("Clock In", 0)]).unwrap();
        let hit = router.route("I want to CLOCK IN now").unwrap();
        assert_eq!(hit.rank, 0);
        assert_eq!(hit.phrase, "clock in");
        assert_eq!(hit.start, 10);
    }

    #[test]
    fn lowest_rank_wins_over_earlier_position() {
        let router = PhraseRouter::build([("vacation", 0), ("clock in", 1)]).unwrap();
        let hit = router.route("clock in, then plan a vacation").unwrap();
        assert_eq!(hit.rank, 0);
    }

    #[test]
    fn overlapping_phrases_are_all_considered() {
        // "day off" sits inside "holiday off"; the lower rank must still win.
        let router = PhraseRouter::build([("day off", 0), ("holiday off", 1)]).unwrap();
        let hit = router.route("one holiday off please").unwrap();
        assert_eq!(hit.rank, 0);
    }

    #[test]
    fn no_match_returns_none() {
        let router = PhraseRouter::build([("payslip", 0)]).unwrap();
        assert!(router.route("what's the weather").is_none());
    }

    #[test]
    fn blank_phrases_are_skipped() {
        let router = PhraseRouter::build([("  ", 0), ("pto", 1)]).unwrap();
        assert_eq!(router.phrase_count(), 1);
        assert!(router.route("anything").is_none());
        assert_eq!(router.route("some pto").unwrap().rank, 1);
    }

    #[test]
    fn empty_router_matches_nothing() {
        let router = PhraseRouter::build(Vec::<(String, usize)>::new()).unwrap();
        assert!(router.route("clock in").is_none());
    }
}
