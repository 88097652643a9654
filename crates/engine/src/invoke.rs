//! Command invocation. Failures never escape: errors and panics raised by a
//! command are downgraded to a reported [`InvocationResult`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use cmdbridge_registry::{CatalogEntry, Command};
use cmdbridge_types::{CoercedArguments, CommandOutput, InvocationResult};
use cmdbridge_util::{HistoryLog, escape_markup, redact_sensitive, summarize_arguments};
use tracing::{debug, info, warn};

use crate::classify::APPLIANCES;
use crate::context::SubmissionContext;

pub const NO_APPLIANCES_MESSAGE: &str = "Must select at least one appliance.";

/// Prefix of the display output reported for a failed command.
pub const UNHANDLED_FAILURE_MESSAGE: &str = "Sorry, an unhandled exception occurred while performing action:";

/// Stands in for any command that was submitted without appliances.
struct NoAppliancesSelected;

impl Command for NoAppliancesSelected {
    fn invoke(&self, _arguments: &CoercedArguments) -> anyhow::Result<CommandOutput> {
        Ok(CommandOutput::new(NO_APPLIANCES_MESSAGE, NO_APPLIANCES_MESSAGE))
    }
}

/// Calls commands and persists their history.
#[derive(Clone)]
pub struct Invoker {
    history: Arc<dyn HistoryLog>,
}

impl Invoker {
    pub fn new(history: Arc<dyn HistoryLog>) -> Self {
        Self { history }
    }

    pub fn history(&self) -> &Arc<dyn HistoryLog> {
        &self.history
    }

    /// Invokes `entry` with `arguments`.
    ///
    /// A command that declares `appliances` but received none (or only blank
    /// names) is not called; a fixed informational result is returned
    /// instead. The history of every outcome is persisted and its log id
    /// recorded on the result.
    pub fn invoke(&self, entry: &CatalogEntry, arguments: &CoercedArguments, context: &SubmissionContext) -> InvocationResult {
        let descriptor = &entry.descriptor;
        let command: &dyn Command = if descriptor.declares(APPLIANCES) && !has_appliances(arguments) {
            info!(command = %descriptor.canonical_id(), "no appliances selected; skipping invocation");
            &NoAppliancesSelected
        } else {
            entry.command.as_ref()
        };

        debug!(
            command = %descriptor.canonical_id(),
            arguments = %redact_sensitive(&summarize_arguments(arguments)),
            "invoking command"
        );
        let mut result = match panic::catch_unwind(AssertUnwindSafe(|| command.invoke(arguments))) {
            Ok(Ok(output)) => InvocationResult::from(output),
            Ok(Err(error)) => {
                warn!(command = %descriptor.canonical_id(), error = ?error, "command failed");
                failure_result(&error.to_string(), format!("{error:?}"))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(command = %descriptor.canonical_id(), panic = %message, "command panicked");
                failure_result(&message, format!("command panicked: {message}"))
            }
        };

        match self.history.persist(context.timestamp(), &result.history) {
            Ok(id) => result.history_id = Some(id),
            Err(error) => warn!(command = %descriptor.canonical_id(), error = %error, "failed to persist request history"),
        }
        result
    }
}

fn has_appliances(arguments: &CoercedArguments) -> bool {
    arguments
        .get_list(APPLIANCES)
        .is_some_and(|appliances| appliances.iter().any(|name| !name.trim().is_empty()))
}

fn failure_result(summary: &str, trace: String) -> InvocationResult {
    InvocationResult {
        display_output: format!("{UNHANDLED_FAILURE_MESSAGE}\n\n\t {}", escape_markup(summary)),
        history: trace,
        error: Some(summary.to_string()),
        history_id: None,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "command panicked".to_string()
    }
}
