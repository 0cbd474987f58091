//! Form validation and confirmation synthesis.
//!
//! Validation is pure: it takes the form flow, the submitted values and
//! today's date, and either accepts or returns per-field errors plus a
//! summary banner.  It never touches run state.
//!
//! Range rules and the day count apply to the flow's [`DateRange`]: the
//! fast-path binding's date fields when one is declared, otherwise the
//! `start_date` / `end_date` pair.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use scriptflow_intent::{FieldKind, Flow, FormData};

/// Format of submitted date fields.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const START_FIELD: &str = "start_date";
const END_FIELD: &str = "end_date";

/// Header line of a synthesized confirmation.
pub const CONFIRMATION_HEADER: &str = "Here's a summary of your request:";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Why a single field was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Missing,
    InvalidDate,
    UnknownChoice,
    StartInPast,
    EndBeforeStart,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Missing => "This field is required",
            Self::InvalidDate => "Enter a date as YYYY-MM-DD",
            Self::UnknownChoice => "Pick one of the listed options",
            Self::StartInPast => "Start date cannot be in the past",
            Self::EndBeforeStart => "End date must be on or after the start date",
        };
        f.write_str(text)
    }
}

/// A rejected submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormErrors {
    /// Errors keyed by field id.
    pub field_errors: BTreeMap<String, FieldError>,
    /// Banner shown above the form.
    pub summary: String,
}

impl FormErrors {
    fn new(field_errors: BTreeMap<String, FieldError>) -> Self {
        let n = field_errors.len();
        let summary = if n == 1 {
            "Please fix 1 field before submitting.".to_string()
        } else {
            format!("Please fix {n} fields before submitting.")
        };
        Self {
            field_errors,
            summary,
        }
    }

    pub fn get(&self, field_id: &str) -> Option<&FieldError> {
        self.field_errors.get(field_id)
    }
}

/// The start and end date fields of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange<'a> {
    pub start: &'a str,
    pub end: &'a str,
}

impl<'a> DateRange<'a> {
    /// The date range of `flow`'s form, if both ends are date fields.
    pub fn of(flow: &'a Flow) -> Option<Self> {
        let fields = flow.form_fields()?;
        let range = match &flow.fast_path {
            Some(binding) => Self {
                start: &binding.start_field,
                end: &binding.end_field,
            },
            None => Self {
                start: START_FIELD,
                end: END_FIELD,
            },
        };

        let is_date = |id: &str| {
            fields
                .iter()
                .any(|f| f.id == id && f.kind == FieldKind::Date)
        };
        (is_date(range.start) && is_date(range.end)).then_some(range)
    }

    fn dates(&self, values: &FormData) -> (Option<NaiveDate>, Option<NaiveDate>) {
        (date_value(values, self.start), date_value(values, self.end))
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate `values` against the form of `flow`.
///
/// A flow without a form has nothing to check.
pub fn validate(flow: &Flow, values: &FormData, today: NaiveDate) -> Result<(), FormErrors> {
    let mut errors = BTreeMap::new();
    let fields = flow.form_fields().unwrap_or_default();

    for field in fields {
        let value = values.get(&field.id).map(|v| v.trim()).unwrap_or("");
        if value.is_empty() {
            if field.required {
                errors.insert(field.id.clone(), FieldError::Missing);
            }
            continue;
        }

        match field.kind {
            FieldKind::Date if parse_date(value).is_none() => {
                errors.insert(field.id.clone(), FieldError::InvalidDate);
            }
            FieldKind::Choice if !field.choices.iter().any(|c| c == value) => {
                errors.insert(field.id.clone(), FieldError::UnknownChoice);
            }
            _ => {}
        }
    }

    if let Some(range) = DateRange::of(flow) {
        let (start, end) = range.dates(values);

        if let Some(start) = start
            && start < today
        {
            errors.insert(range.start.to_string(), FieldError::StartInPast);
        }
        if let (Some(start), Some(end)) = (start, end)
            && end < start
        {
            errors.insert(range.end.to_string(), FieldError::EndBeforeStart);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(FormErrors::new(errors))
    }
}

/// Inclusive number of days between the start and end dates of `flow`.
///
/// `None` when the flow has no date range, either date is missing or
/// unparseable, or the range is inverted.
pub fn day_count(flow: &Flow, values: &FormData) -> Option<i64> {
    let (Some(start), Some(end)) = DateRange::of(flow)?.dates(values) else {
        return None;
    };
    (end >= start).then(|| (end - start).num_days() + 1)
}

// ---------------------------------------------------------------------------
// Confirmation
// ---------------------------------------------------------------------------

/// Summary message appended after a form flow's final messages.
pub fn confirmation_text(flow: &Flow, values: &FormData) -> String {
    let mut lines = vec![CONFIRMATION_HEADER.to_string()];

    for field in flow.form_fields().unwrap_or_default() {
        if let Some(value) = values.get(&field.id).map(|v| v.trim())
            && !value.is_empty()
        {
            lines.push(format!("• {}: {}", field.label, value));
        }
    }

    if let Some(days) = day_count(flow, values) {
        let unit = if days == 1 { "day" } else { "days" };
        lines.push(format!("Total: {days} {unit}"));
    }

    lines.join("\n")
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

fn date_value(values: &FormData, id: &str) -> Option<NaiveDate> {
    parse_date(values.get(id)?.trim())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
