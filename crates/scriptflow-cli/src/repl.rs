//! Subcommand: `scriptflow run` -- interactive REPL.
//!
//! Each line is a trigger.  Messages are printed as the runner appends
//! them; when a form is waiting the REPL asks for its fields one by one
//! and submits them.

use std::sync::Arc;

use anyhow::{Context, Result};
use scriptflow_intent::{FieldKind, FieldSpec, FormData};
use scriptflow_runner::{Collaborators, FlowRunner, RunState, RunnerError};
use scriptflow_store::{FixedSession, Message, MessageLog, MessageSink, Sender, StepLog};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::helpers::{load_catalog, load_config};

const SESSION_ID: &str = "terminal";

/// Run the interactive REPL.
pub async fn cmd_run(cli: &Cli) -> Result<()> {
    let catalog = Arc::new(load_catalog(cli.catalog.as_deref())?);
    let config = load_config(&cli.config, cli.speed)?;

    let log = MessageLog::new();
    let collaborators = Collaborators {
        messages: Arc::new(log.clone()),
        steps: Arc::new(StepLog::new()),
        session: Arc::new(FixedSession::new(SESSION_ID)),
    };
    let runner = FlowRunner::new(Arc::clone(&catalog), collaborators, config)
        .context("failed to create flow runner")?;
    info!(flows = catalog.len(), "flow runner ready");

    let printer = tokio::spawn(print_messages(log.subscribe()));

    println!();
    println!("  scriptflow v{}", env!("CARGO_PKG_VERSION"));
    println!("  Try \"clock in\", \"time off\" or \"payslip\".");
    println!("  /state shows the run, /abandon drops a waiting form, quit exits.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut states = runner.subscribe();
    let mut prompt: Option<FormPrompt> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    break;
                };
                let trimmed = line.trim();

                match trimmed {
                    "quit" | "exit" => break,
                    "/state" => print_state(&runner.observe_run_state(), runner.pending_timers().len()),
                    "/abandon" => {
                        if runner.abandon() {
                            prompt = None;
                            println!("  (form abandoned)");
                        } else {
                            println!("  (no form is waiting)");
                        }
                    }
                    _ => match prompt.as_mut() {
                        Some(form) => {
                            form.answer(trimmed);
                            if form.is_complete() {
                                submit(&runner, &mut prompt);
                            } else {
                                form.ask();
                            }
                        }
                        None if trimmed.is_empty() => {}
                        None => trigger(&runner, &log, trimmed).await,
                    },
                }
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                match state.pending_form() {
                    Some(fields) if prompt.is_none() => {
                        let form = FormPrompt::new(fields.to_vec());
                        form.ask();
                        prompt = Some(form);
                    }
                    Some(_) => {}
                    None => prompt = None,
                }
            }
        }
    }

    let cancelled = runner.shutdown();
    info!(cancelled, "session closed");
    printer.abort();
    println!("  Goodbye.");
    Ok(())
}

async fn trigger(runner: &FlowRunner, log: &MessageLog, text: &str) {
    if let Err(e) = log.append_message(Message::user(text)).await {
        warn!(error = %e, "could not record user message");
    }
    if !runner.trigger_demo(text) {
        let state = runner.observe_run_state();
        if state.is_processing {
            println!("  (still working on the previous request)");
        } else {
            println!("  (no flow matches that)");
        }
    }
}

fn submit(runner: &FlowRunner, prompt: &mut Option<FormPrompt>) {
    let Some(form) = prompt.as_mut() else {
        return;
    };

    match runner.submit_form(form.values.clone()) {
        Ok(()) => *prompt = None,
        Err(RunnerError::Validation(errors)) => {
            println!("  {}", errors.summary);
            for (field, error) in &errors.field_errors {
                println!("    {field}: {error}");
            }
            form.retry(errors.field_errors.keys());
            form.ask();
        }
        Err(e) => {
            println!("  ({e})");
            *prompt = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

async fn print_messages(mut rx: broadcast::Receiver<Message>) {
    loop {
        match rx.recv().await {
            Ok(message) => match message.sender {
                Sender::User => {}
                Sender::System => println!("  · {}", message.text),
                Sender::Assistant => {
                    let agent = message.agent.as_deref().unwrap_or("Assistant");
                    for (i, line) in message.text.lines().enumerate() {
                        if i == 0 {
                            println!("  [{agent}] {line}");
                        } else {
                            println!("  {:width$}  {line}", "", width = agent.len() + 2);
                        }
                    }
                }
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "message printer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_state(state: &RunState, pending_timers: usize) {
    let flow = state
        .active_flow
        .as_ref()
        .map(|f| f.id.as_str())
        .unwrap_or("-");
    println!(
        "  flow={flow} stage={} processing={} typing={} timers={pending_timers}",
        state.stage, state.is_processing, state.show_typing_indicator
    );
    for (field, value) in &state.form_data {
        println!("    {field} = {value}");
    }
}

// ---------------------------------------------------------------------------
// Form prompting
// ---------------------------------------------------------------------------

/// Collects form values one field per input line.
struct FormPrompt {
    fields: Vec<FieldSpec>,
    /// Indices of fields still to ask, in order.
    queue: Vec<usize>,
    values: FormData,
}

impl FormPrompt {
    fn new(fields: Vec<FieldSpec>) -> Self {
        let queue = (0..fields.len()).rev().collect();
        Self {
            fields,
            queue,
            values: FormData::new(),
        }
    }

    fn current(&self) -> Option<&FieldSpec> {
        self.queue.last().map(|&i| &self.fields[i])
    }

    fn ask(&self) {
        let Some(field) = self.current() else {
            return;
        };
        let hint = match field.kind {
            FieldKind::Date => " (YYYY-MM-DD)".to_string(),
            FieldKind::Choice => format!(" [{}]", field.choices.join("/")),
            FieldKind::Text => String::new(),
        };
        let optional = if field.required { "" } else { ", optional" };
        println!("  ? {}{hint}{optional}:", field.label);
    }

    fn answer(&mut self, value: &str) {
        if let Some(index) = self.queue.pop() {
            self.values
                .insert(self.fields[index].id.clone(), value.to_string());
        }
    }

    fn is_complete(&self) -> bool {
        self.queue.is_empty()
    }

    /// Ask again for the fields named in `ids`.
    fn retry<'a>(&mut self, ids: impl Iterator<Item = &'a String>) {
        let ids: Vec<&String> = ids.collect();
        self.queue = (0..self.fields.len())
            .rev()
            .filter(|&i| ids.contains(&&self.fields[i].id))
            .collect();
    }
}
