//! Flow definitions: the static description of one scripted interaction.
//!
//! A [`Flow`] lists the phrases that trigger it, the system messages played
//! while the simulated backend "works", the assistant's response, optional
//! final messages, and optional approval / notification cascades.  Flows are
//! immutable once defined; all run-time state lives in the runner.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IntentError, Result};

/// Collected form values, keyed by field id.
pub type FormData = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Form fields
// ---------------------------------------------------------------------------

/// The input kind of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text.
    Text,
    /// A calendar date, submitted as `YYYY-MM-DD`.
    Date,
    /// One of a fixed set of choices.
    Choice,
}

/// Describes one field collected by a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Stable identifier, also the key in [`FormData`].
    pub id: String,
    /// Label shown to the user and used in confirmation summaries.
    pub label: String,
    pub kind: FieldKind,
    /// Allowed values for [`FieldKind::Choice`] fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    /// An optional free-text field.
    pub fn text(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: FieldKind::Text,
            choices: Vec::new(),
            required: false,
        }
    }

    /// An optional date field.
    pub fn date(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: FieldKind::Date,
            ..Self::text(id, label)
        }
    }

    /// An optional choice field.
    pub fn choice<I, S>(id: impl Into<String>, label: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: FieldKind::Choice,
            choices: choices.into_iter().map(Into::into).collect(),
            ..Self::text(id, label)
        }
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Agent response
// ---------------------------------------------------------------------------

/// The concrete action an `action` response stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ClockIn,
    ClockOut,
    ViewSchedule,
    ViewPayslip,
}

/// What the assistant answers once the system messages have played.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentResponse {
    /// Ask the user to fill in a form; playback pauses until submission.
    Form { body: String, fields: Vec<FieldSpec> },
    /// Confirm something that needs no input.
    Confirmation { body: String },
    /// Report an action performed on the user's behalf.
    Action { body: String, action: ActionKind },
}

impl AgentResponse {
    /// The text of the assistant message.
    pub fn body(&self) -> &str {
        match self {
            Self::Form { body, .. } | Self::Confirmation { body } | Self::Action { body, .. } => {
                body
            }
        }
    }

    /// The fields to collect, for form responses.
    pub fn form_fields(&self) -> Option<&[FieldSpec]> {
        match self {
            Self::Form { fields, .. } => Some(fields),
            Self::Confirmation { .. } | Self::Action { .. } => None,
        }
    }

    /// Short machine-readable kind name.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Form { .. } => "form",
            Self::Confirmation { .. } => "confirmation",
            Self::Action { .. } => "action",
        }
    }
}

// ---------------------------------------------------------------------------
// Cascades
// ---------------------------------------------------------------------------

/// A secondary sequence of delayed messages played after the main flow.
///
/// Message `i` is appended at `delay + i * step`, where `step` is the
/// runner's cascade pacing.  For the approval cascade, `closing` (or a
/// default "approved" text) follows the last message one step later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cascade {
    /// Offset of the first message from the start of the cascade.
    pub delay_ms: u64,
    pub messages: Vec<String>,
    /// Approval cascades only: text of the synthesized closing message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing: Option<String>,
}

impl Cascade {
    pub fn new<I, S>(delay_ms: u64, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            delay_ms,
            messages: messages.into_iter().map(Into::into).collect(),
            closing: None,
        }
    }

    /// Set the closing message template.
    pub fn with_closing(mut self, closing: impl Into<String>) -> Self {
        self.closing = Some(closing.into());
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Fast path
// ---------------------------------------------------------------------------

/// Declares that a form flow can skip its form when the triggering text
/// already names a date range and a leave type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastPathBinding {
    /// Field receiving the first extracted date.
    pub start_field: String,
    /// Field receiving the second extracted date.
    pub end_field: String,
    /// Field receiving the extracted leave type.
    pub leave_type_field: String,
    /// Assistant message used instead of the form prompt.
    pub acknowledgement: String,
}

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

/// A complete scripted interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    /// Unique identifier within a catalog.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Tag attached to assistant messages.
    #[serde(default = "default_agent")]
    pub agent: String,
    /// Phrases that start this flow (case-insensitive substring match).
    pub triggers: Vec<String>,
    /// Messages from the simulated backend, played in order.
    #[serde(default)]
    pub system_messages: Vec<String>,
    pub agent_response: AgentResponse,
    /// Messages played after the agent response (or form submission).
    #[serde(default)]
    pub final_messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_cascade: Option<Cascade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_cascade: Option<Cascade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fast_path: Option<FastPathBinding>,
}

fn default_agent() -> String {
    "Assistant".to_string()
}

impl Flow {
    /// Create a flow with no triggers or messages.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        agent_response: AgentResponse,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            agent: default_agent(),
            triggers: Vec::new(),
            system_messages: Vec::new(),
            agent_response,
            final_messages: Vec::new(),
            approval_cascade: None,
            notification_cascade: None,
            fast_path: None,
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    pub fn with_triggers<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggers = triggers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_system_messages<I, S>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.system_messages = messages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_final_messages<I, S>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.final_messages = messages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_approval_cascade(mut self, cascade: Cascade) -> Self {
        self.approval_cascade = Some(cascade);
        self
    }

    pub fn with_notification_cascade(mut self, cascade: Cascade) -> Self {
        self.notification_cascade = Some(cascade);
        self
    }

    pub fn with_fast_path(mut self, binding: FastPathBinding) -> Self {
        self.fast_path = Some(binding);
        self
    }

    /// The fields to collect, for form flows.
    pub fn form_fields(&self) -> Option<&[FieldSpec]> {
        self.agent_response.form_fields()
    }

    /// Whether the flow declares any cascade.
    pub fn has_cascades(&self) -> bool {
        self.approval_cascade.is_some() || self.notification_cascade.is_some()
    }

    /// Check the structural rules every catalog flow must satisfy.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| IntentError::InvalidFlow {
            flow_id: self.id.clone(),
            reason,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("flow id is blank".into()));
        }
        if self.triggers.iter().all(|t| t.trim().is_empty()) {
            return Err(invalid("flow has no triggers".into()));
        }

        if let Some(fields) = self.form_fields() {
            if fields.is_empty() {
                return Err(invalid("form response has no fields".into()));
            }
            for (i, field) in fields.iter().enumerate() {
                if fields[..i].iter().any(|f| f.id == field.id) {
                    return Err(invalid(format!("duplicate field id `{}`", field.id)));
                }
                if field.kind == FieldKind::Choice && field.choices.is_empty() {
                    return Err(invalid(format!("choice field `{}` has no choices", field.id)));
                }
            }
        }

        if let Some(binding) = &self.fast_path {
            let fields = self
                .form_fields()
                .ok_or_else(|| invalid("fast path declared on a non-form flow".into()))?;
            for id in [
                &binding.start_field,
                &binding.end_field,
                &binding.leave_type_field,
            ] {
                if !fields.iter().any(|f| &f.id == id) {
                    return Err(invalid(format!("fast path names unknown field `{id}`")));
                }
            }
            for id in [&binding.start_field, &binding.end_field] {
                if fields.iter().any(|f| &f.id == id && f.kind != FieldKind::Date) {
                    return Err(invalid(format!("fast path date field `{id}` is not a date")));
                }
            }
        }

        if self
            .notification_cascade
            .as_ref()
            .is_some_and(|c| c.closing.is_some())
        {
            return Err(invalid("notification cascade cannot have a closing message".into()));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Replace `{field_id}` placeholders with collected values.
///
/// Placeholders naming a field without a value, and braces that do not
/// enclose an identifier, are left untouched.
pub fn render_template(template: &str, values: &FormData) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };

        let key = &after[..close];
        let is_ident = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        match values.get(key) {
            Some(value) if is_ident => out.push_str(value),
            _ => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
