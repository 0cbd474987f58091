//! Flow catalog: the static table of scripted interactions.
//!
//! Flows are kept in declaration order because trigger matching resolves
//! overlaps in favour of the earliest-declared flow.  A catalog is built
//! once (from [`FlowCatalog::builtin`], code, or a TOML document) and
//! never mutated afterwards.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{IntentError, Result};
use crate::flow::{ActionKind, AgentResponse, Cascade, FastPathBinding, FieldSpec, Flow};

/// On-disk shape: a `[[flows]]` array of tables.
#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    flows: Vec<Flow>,
}

/// An immutable, ordered set of validated flows.
#[derive(Debug, Clone)]
pub struct FlowCatalog {
    flows: Vec<Arc<Flow>>,
}

impl FlowCatalog {
    /// Build a catalog from flows in declaration order.
    ///
    /// Every flow is validated and ids must be unique.
    pub fn from_flows(flows: Vec<Flow>) -> Result<Self> {
        if flows.is_empty() {
            return Err(IntentError::EmptyCatalog);
        }

        let mut seen = HashSet::new();
        for flow in &flows {
            flow.validate()?;
            if !seen.insert(flow.id.as_str()) {
                return Err(IntentError::DuplicateFlow {
                    flow_id: flow.id.clone(),
                });
            }
            debug!(flow_id = %flow.id, triggers = flow.triggers.len(), "flow registered");
        }

        Ok(Self {
            flows: flows.into_iter().map(Arc::new).collect(),
        })
    }

    /// Parse a catalog from a TOML document.
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(document)?;
        Self::from_flows(file.flows)
    }

    /// Load a catalog from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| IntentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_toml_str(&document)?;
        info!(path = %path.display(), flows = catalog.len(), "flow catalog loaded");
        Ok(catalog)
    }

    /// Look up a flow by id.
    pub fn get(&self, id: &str) -> Option<&Arc<Flow>> {
        self.flows.iter().find(|f| f.id == id)
    }

    /// The flow at a declaration index.
    pub fn at(&self, index: usize) -> Option<&Arc<Flow>> {
        self.flows.get(index)
    }

    /// Iterate flows in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Flow>> {
        self.flows.iter()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// The built-in HR assistant catalog.
    pub fn builtin() -> Self {
        Self {
            flows: builtin_flows().into_iter().map(Arc::new).collect(),
        }
    }
}

impl Default for FlowCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// ---------------------------------------------------------------------------
// Built-in flows
// ---------------------------------------------------------------------------

fn builtin_flows() -> Vec<Flow> {
    vec![time_off_flow(), clock_in_flow(), payslip_flow()]
}

fn time_off_flow() -> Flow {
    Flow::new(
        "time-off",
        "Time Off Request",
        AgentResponse::Form {
            body: "I can help you request time off. Please fill in the details below.".into(),
            fields: vec![
                FieldSpec::date("start_date", "Start Date").required(),
                FieldSpec::date("end_date", "End Date").required(),
                FieldSpec::choice(
                    "leave_type",
                    "Leave Type",
                    ["Vacation", "Sick", "Personal", "Bereavement", "Parental"],
                )
                .required(),
                FieldSpec::text("notes", "Notes"),
            ],
        },
    )
    .with_agent("HR Assistant")
    .with_triggers([
        "time off",
        "leave request",
        "request leave",
        "day off",
        "days off",
        "take pto",
        "vacation",
    ])
    .with_system_messages([
        "Analyzing your request...",
        "Checking your leave balance in the HR system...",
        "Found 12 vacation days and 5 sick days available.",
    ])
    .with_final_messages([
        "Validating your dates against the team calendar...",
        "No conflicts found between {start_date} and {end_date}.",
        "Submitting your {leave_type} request...",
    ])
    .with_approval_cascade(
        Cascade::new(
            2_000,
            [
                "Your request was routed to your manager, Sarah Chen, for approval.",
                "Sarah Chen is reviewing your request...",
            ],
        )
        .with_closing("✅ Approved by Sarah Chen. Enjoy your {leave_type} leave!"),
    )
    .with_notification_cascade(Cascade::new(
        2_500,
        [
            "📱 Push notification sent to your mobile device.",
            "📧 Confirmation email sent to your inbox.",
        ],
    ))
    .with_fast_path(FastPathBinding {
        start_field: "start_date".into(),
        end_field: "end_date".into(),
        leave_type_field: "leave_type".into(),
        acknowledgement: "I found your dates and leave type in your message, so there's no form \
                          to fill in. Submitting it for you now."
            .into(),
    })
}

fn clock_in_flow() -> Flow {
    Flow::new(
        "clock-in",
        "Clock In",
        AgentResponse::Action {
            body: "You're clocked in. Have a great shift!".into(),
            action: ActionKind::ClockIn,
        },
    )
    .with_agent("Time Tracking Agent")
    .with_triggers(["clock in", "clock me in", "punch in", "start my shift"])
    .with_system_messages([
        "Verifying your identity...",
        "Connecting to the time-tracking system...",
        "Checking your shift schedule...",
        "Location verified: Main Office.",
    ])
    .with_final_messages([
        "Hours this week: 32.5 of 40 scheduled.",
        "Today's schedule: 9:00 AM to 5:30 PM, lunch at 12:30 PM.",
    ])
}

fn payslip_flow() -> Flow {
    Flow::new(
        "payslip",
        "Payslip",
        AgentResponse::Confirmation {
            body: "Your payslip for the last pay period is ready.".into(),
        },
    )
    .with_agent("Payroll Agent")
    .with_triggers(["payslip", "pay stub", "paycheck", "salary"])
    .with_system_messages([
        "Fetching your latest payroll record...",
        "Decrypting your payslip...",
    ])
    .with_final_messages(["Net pay: $3,482.16, deposited to the account ending in 4821."])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const TWO_FLOWS: &str = r#"
[[flows]]
id = "greet"
name = "Greeting"
triggers = ["hello", "hi there"]
system_messages = ["Waking up..."]

[flows.agent_response]
kind = "confirmation"
body = "Hello!"

[[flows]]
id = "leave"
name = "Leave"
agent = "HR"
triggers = ["leave"]
final_messages = ["Filed {leave_type}."]

[flows.agent_response]
kind = "form"
body = "Fill this in"

[[flows.agent_response.fields]]
id = "leave_type"
label = "Leave Type"
kind = "choice"
choices = ["Vacation", "Sick"]
required = true

[flows.approval_cascade]
delay_ms = 500
messages = ["Sent to manager."]
"#;

    #[test]
    fn builtin_catalog_is_valid() {
        let flows: Vec<Flow> = FlowCatalog::builtin().iter().map(|f| (**f).clone()).collect();
        let catalog = FlowCatalog::from_flows(flows).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.at(0).unwrap().id, "time-off");
    }

    #[test]
    fn builtin_shapes() {
        let catalog = FlowCatalog::builtin();

        let time_off = catalog.get("time-off").unwrap();
        assert_eq!(time_off.system_messages.len(), 3);
        assert_eq!(time_off.final_messages.len(), 3);
        assert_eq!(time_off.approval_cascade.as_ref().unwrap().messages.len(), 2);
        assert_eq!(time_off.notification_cascade.as_ref().unwrap().messages.len(), 2);
        assert!(time_off.fast_path.is_some());

        let clock_in = catalog.get("clock-in").unwrap();
        assert_eq!(clock_in.system_messages.len(), 4);
        assert_eq!(clock_in.final_messages.len(), 2);
        assert!(clock_in.form_fields().is_none());
        assert!(!clock_in.has_cascades());
    }

    #[test]
    fn parse_toml_catalog() {
        let catalog = FlowCatalog::from_toml_str(TWO_FLOWS).unwrap();
        assert_eq!(catalog.len(), 2);

        let greet = catalog.get("greet").unwrap();
        assert_eq!(greet.agent, "Assistant");
        assert_eq!(greet.agent_response.kind_name(), "confirmation");

        let leave = catalog.get("leave").unwrap();
        assert_eq!(leave.form_fields().unwrap()[0].choices, vec!["Vacation", "Sick"]);
        assert_eq!(leave.approval_cascade.as_ref().unwrap().delay_ms, 500);
        assert!(leave.notification_cascade.is_none());
    }

    #[test]
    fn empty_catalog_is_rejected() {
        let result = FlowCatalog::from_toml_str("");
        assert!(matches!(result, Err(IntentError::EmptyCatalog)));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let flow = FlowCatalog::builtin().get("payslip").unwrap().as_ref().clone();
        let result = FlowCatalog::from_flows(vec![flow.clone(), flow]);
        assert!(matches!(result, Err(IntentError::DuplicateFlow { flow_id }) if flow_id == "payslip"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let result = FlowCatalog::from_toml_str("[[flows]]\nid = 3");
        assert!(matches!(result, Err(IntentError::CatalogParse(_))));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TWO_FLOWS.as_bytes()).unwrap();

        let catalog = FlowCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let result = FlowCatalog::load("/definitely/not/here.toml");
        assert!(matches!(result, Err(IntentError::Io { .. })));
    }
}
