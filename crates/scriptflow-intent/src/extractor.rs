//! Entity extractor: pulls a date range and a leave type out of free text.
//!
//! It only feeds the fast path, which lets a user skip the time-off form by
//! typing something like "vacation 09/10/2025 to 09/12/2025".
//!
//! - **Dates**: `month/day/year` tokens with `/` or `-` separators and a
//!   2–4 digit year, returned verbatim in order of appearance.
//! - **Leave type**: the earliest whole-word occurrence of a word from a
//!   fixed vocabulary, returned lower-cased.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use crate::error::{IntentError, Result};

/// Default leave-type vocabulary.
pub const LEAVE_TYPES: [&str; 5] = ["vacation", "sick", "personal", "bereavement", "parental"];

const DATE_PATTERN: &str = r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})\b";

/// Entities found in a piece of text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Entities {
    /// Date-like tokens in order of appearance.
    pub dates: Vec<String>,
    /// The first leave-type word found, lower-cased.
    pub leave_type: Option<String>,
}

impl Entities {
    /// At least two dates and a leave type: enough to fill a leave form.
    pub fn is_fast_path_eligible(&self) -> bool {
        self.dates.len() >= 2 && self.leave_type.is_some()
    }
}

/// Date and leave-type scanner.
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    date_pattern: Regex,
    vocabulary: Vec<String>,
    automaton: AhoCorasick,
}

impl EntityExtractor {
    /// An extractor using [`LEAVE_TYPES`].
    pub fn new() -> Result<Self> {
        Self::with_vocabulary(LEAVE_TYPES)
    }

    /// An extractor with a custom leave-type vocabulary.
    pub fn with_vocabulary<I, S>(words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let vocabulary: Vec<String> = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        let date_pattern = Regex::new(DATE_PATTERN).map_err(|e| IntentError::Pattern {
            reason: e.to_string(),
        })?;
        let automaton = AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostLongest)
            .build(&vocabulary)
            .map_err(|e| IntentError::Pattern {
                reason: e.to_string(),
            })?;

        Ok(Self {
            date_pattern,
            vocabulary,
            automaton,
        })
    }

    /// Scan `text` for dates and a leave type.
    pub fn extract(&self, text: &str) -> Entities {
        let dates = self
            .date_pattern
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();

        let leave_type = self
            .automaton
            .find_iter(text)
            .find(|m| is_whole_word(text, m.start(), m.end()))
            .map(|m| self.vocabulary[m.pattern().as_usize()].clone());

        Entities { dates, leave_type }
    }
}

/// Whether `text[start..end]` is not glued to a letter or digit on either side.
fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    [before, after]
        .into_iter()
        .all(|c| c.is_none_or(|c| !c.is_alphanumeric()))
}

/// Parse a `month/day/year` token into a calendar date.
///
/// Two-digit years are taken as 20xx.  Returns `None` for tokens that do not
/// name a real date (e.g. `02/30/2025`).
pub fn parse_date_token(token: &str) -> Option<NaiveDate> {
    let mut parts = token.split(['/', '-']);
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    let year_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let mut year: i32 = year_part.parse().ok()?;
    if year_part.len() <= 2 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
