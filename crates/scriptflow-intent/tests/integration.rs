//! Integration tests for the scriptflow-intent crate: a catalog loaded from
//! disk, matched against user text, with the fast path resolving forms.

use std::io::Write;
use std::sync::Arc;

use scriptflow_intent::{
    DisabledFastPath, EntityExtractor, ExtractorFastPath, FastPathPredicate, FlowCatalog,
    IntentError, TriggerMatcher, render_template,
};

const CATALOG: &str = r#"
[[flows]]
id = "expenses"
name = "Expense Claim"
agent = "Finance Bot"
triggers = ["expense", "reimburse"]
system_messages = ["Opening the expense ledger..."]
final_messages = ["Claim filed for {amount}."]

[flows.agent_response]
kind = "form"
body = "Tell me about the expense."

[[flows.agent_response.fields]]
id = "amount"
label = "Amount"
kind = "text"
required = true

[[flows]]
id = "leave"
name = "Leave"
triggers = ["leave", "vacation"]

[flows.agent_response]
kind = "form"
body = "When are you off?"

[[flows.agent_response.fields]]
id = "from"
label = "From"
kind = "date"
required = true

[[flows.agent_response.fields]]
id = "to"
label = "To"
kind = "date"
required = true

[[flows.agent_response.fields]]
id = "kind"
label = "Kind"
kind = "choice"
choices = ["Vacation", "Sick"]
required = true

[flows.fast_path]
start_field = "from"
end_field = "to"
leave_type_field = "kind"
acknowledgement = "Got it, filing that now."

[flows.notification_cascade]
delay_ms = 100
messages = ["Emailed your manager."]
"#;

fn load() -> Arc<FlowCatalog> {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CATALOG.as_bytes()).unwrap();
    Arc::new(FlowCatalog::load(file.path()).unwrap())
}

#[test]
fn loaded_catalog_matches_in_declaration_order() {
    let matcher = TriggerMatcher::new(load()).unwrap();

    assert_eq!(matcher.match_flow("Reimburse my vacation flights").unwrap().id, "expenses");
    assert_eq!(matcher.match_flow("LEAVE next week").unwrap().id, "leave");
    assert!(matcher.match_flow("hello").is_none());
}

#[test]
fn fast_path_uses_the_declared_binding() {
    let catalog = load();
    let flow = catalog.get("leave").unwrap();
    let predicate = ExtractorFastPath::new(EntityExtractor::new().unwrap());

    let data = predicate
        .resolve(flow, "vacation 1/5/27 - 1/9/27 please")
        .unwrap();
    assert_eq!(data.get("from").unwrap(), "2027-01-05");
    assert_eq!(data.get("to").unwrap(), "2027-01-09");
    assert_eq!(data.get("kind").unwrap(), "Vacation");

    assert!(DisabledFastPath.resolve(flow, "vacation 1/5/27 1/9/27").is_none());
}

#[test]
fn final_message_templates_render_form_values() {
    let catalog = load();
    let flow = catalog.get("expenses").unwrap();

    let mut values = scriptflow_intent::FormData::new();
    values.insert("amount".into(), "$42.00".into());
    assert_eq!(
        render_template(&flow.final_messages[0], &values),
        "Claim filed for $42.00."
    );
}

#[test]
fn fast_path_on_a_form_without_binding_fields_is_rejected() {
    let broken = CATALOG.replace("start_field = \"from\"", "start_field = \"begin\"");
    let result = FlowCatalog::from_toml_str(&broken);
    assert!(matches!(
        result,
        Err(IntentError::InvalidFlow { ref flow_id, .. }) if flow_id == "leave"
    ));
}
