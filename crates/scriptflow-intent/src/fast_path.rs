//! Fast-path predicates.
//!
//! The fast path lets a form flow skip its form when the triggering text
//! already supplies every value the form would collect.  The decision is
//! made once, when the trigger matches, and sits behind the
//! [`FastPathPredicate`] trait so the runner never depends on how it is
//! made.

use tracing::debug;

use crate::extractor::{EntityExtractor, parse_date_token};
use crate::flow::{FieldSpec, Flow, FormData};

/// Decides whether a triggering text resolves a flow's form on its own.
pub trait FastPathPredicate: Send + Sync {
    /// Form values synthesized from `text`, or `None` to use the form.
    fn resolve(&self, flow: &Flow, text: &str) -> Option<FormData>;
}

// ---------------------------------------------------------------------------
// ExtractorFastPath
// ---------------------------------------------------------------------------

/// Fast path driven by [`EntityExtractor`].
///
/// Fires only for flows declaring a [`FastPathBinding`](crate::FastPathBinding)
/// and only when the text has at least two dates and a leave type.  Dates
/// are normalized to `YYYY-MM-DD` (the form's date format) when they parse;
/// the leave type is mapped onto the matching choice label.
#[derive(Debug, Clone)]
pub struct ExtractorFastPath {
    extractor: EntityExtractor,
}

impl ExtractorFastPath {
    pub fn new(extractor: EntityExtractor) -> Self {
        Self { extractor }
    }
}

impl FastPathPredicate for ExtractorFastPath {
    fn resolve(&self, flow: &Flow, text: &str) -> Option<FormData> {
        let binding = flow.fast_path.as_ref()?;
        let fields = flow.form_fields()?;

        let entities = self.extractor.extract(text);
        if !entities.is_fast_path_eligible() {
            debug!(flow_id = %flow.id, ?entities, "fast path not eligible");
            return None;
        }
        let leave_type = entities.leave_type?;

        let mut data = FormData::new();
        data.insert(binding.start_field.clone(), normalize_date(&entities.dates[0]));
        data.insert(binding.end_field.clone(), normalize_date(&entities.dates[1]));

        let choice = fields
            .iter()
            .find(|f| f.id == binding.leave_type_field)
            .and_then(|f| matching_choice(f, &leave_type))
            .unwrap_or(leave_type);
        data.insert(binding.leave_type_field.clone(), choice);

        debug!(flow_id = %flow.id, ?data, "fast path resolved form");
        Some(data)
    }
}

fn normalize_date(token: &str) -> String {
    parse_date_token(token)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| token.to_string())
}

fn matching_choice(field: &FieldSpec, token: &str) -> Option<String> {
    field
        .choices
        .iter()
        .find(|c| c.eq_ignore_ascii_case(token))
        .cloned()
}

// ---------------------------------------------------------------------------
// DisabledFastPath
// ---------------------------------------------------------------------------

/// A predicate that never fires; every form flow shows its form.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledFastPath;

impl FastPathPredicate for DisabledFastPath {
    fn resolve(&self, _flow: &Flow, _text: &str) -> Option<FormData> {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FlowCatalog;

    fn predicate() -> ExtractorFastPath {
        ExtractorFastPath::new(EntityExtractor::new().unwrap())
    }

    #[test]
    fn resolves_time_off_form() {
        let catalog = FlowCatalog::builtin();
        let flow = catalog.get("time-off").unwrap();

        let data = predicate()
            .resolve(flow, "09/10/2025 09/12/2025 vacation")
            .unwrap();
        assert_eq!(data.get("start_date").map(String::as_str), Some("2025-09-10"));
        assert_eq!(data.get("end_date").map(String::as_str), Some("2025-09-12"));
        assert_eq!(data.get("leave_type").map(String::as_str), Some("Vacation"));
        assert!(!data.contains_key("notes"));
    }

    #[test]
    fn unparseable_dates_are_kept_verbatim() {
        let catalog = FlowCatalog::builtin();
        let flow = catalog.get("time-off").unwrap();

        let data = predicate()
            .resolve(flow, "sick 02/30/2026 to 03/02/2026")
            .unwrap();
        assert_eq!(data.get("start_date").map(String::as_str), Some("02/30/2026"));
        assert_eq!(data.get("end_date").map(String::as_str), Some("2026-03-02"));
        assert_eq!(data.get("leave_type").map(String::as_str), Some("Sick"));
    }

    #[test]
    fn flows_without_binding_never_fire() {
        let catalog = FlowCatalog::builtin();
        let flow = catalog.get("clock-in").unwrap();
        assert!(
            predicate()
                .resolve(flow, "clock in 09/10/2025 09/12/2025 vacation")
                .is_none()
        );
    }

    #[test]
    fn incomplete_text_uses_the_form() {
        let catalog = FlowCatalog::builtin();
        let flow = catalog.get("time-off").unwrap();
        assert!(predicate().resolve(flow, "I need time off").is_none());
    }

    #[test]
    fn disabled_predicate_never_fires() {
        let catalog = FlowCatalog::builtin();
        let flow = catalog.get("time-off").unwrap();
        assert!(
            DisabledFastPath
                .resolve(flow, "09/10/2025 09/12/2025 vacation")
                .is_none()
        );
    }
}
