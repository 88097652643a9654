//! The invocation bridge: one facade over the form-request and submission
//! paths.

use std::collections::BTreeMap;
use std::sync::Arc;

use cmdbridge_registry::{BridgeConfig, CatalogError, CommandCatalog};
use cmdbridge_types::{FormDescription, PackagedResult, Submission};
use cmdbridge_util::credential_codec::decode_query_field;
use cmdbridge_util::{FileHistoryLog, HistoryLog, HistoryLogError, SessionKey, escape_markup};
use serde::Serialize;
use tracing::{info, warn};

use crate::classify::FieldClassifier;
use crate::coerce::Coercer;
use crate::context::SubmissionContext;
use crate::form::{FormBuilder, FormContext, OptionsProvider};
use crate::invoke::Invoker;
use crate::package::Packager;
use crate::render::{HtmlFragmentRenderer, OutputRenderer};

/// Everything a submission produces: the packaged result and its rendered
/// fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionOutcome {
    pub packaged: PackagedResult,
    pub fragment: String,
}

pub struct Bridge {
    catalog: Arc<CommandCatalog>,
    classifier: FieldClassifier,
    forms: FormBuilder,
    coercer: Coercer,
    invoker: Invoker,
    packager: Packager,
    renderer: Arc<dyn OutputRenderer>,
}

impl Bridge {
    /// Creates a bridge over `catalog` using the directories and domain sets
    /// in `config`. History is written to files under `history_root`.
    pub fn new(catalog: CommandCatalog, config: &BridgeConfig) -> Self {
        let classifier = FieldClassifier::new(config.domain_sets());
        Self {
            catalog: Arc::new(catalog),
            forms: FormBuilder::new(classifier.clone()),
            classifier,
            coercer: Coercer::new(&config.staging_root),
            invoker: Invoker::new(Arc::new(FileHistoryLog::new(&config.history_root))),
            packager: Packager::new(&config.static_root),
            renderer: Arc::new(HtmlFragmentRenderer),
        }
    }

    pub fn with_history_log(mut self, history: Arc<dyn HistoryLog>) -> Self {
        self.invoker = Invoker::new(history);
        self
    }

    pub fn with_options_provider(mut self, options: Arc<dyn OptionsProvider>) -> Self {
        self.forms = FormBuilder::with_options_provider(self.classifier.clone(), options);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn OutputRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn catalog(&self) -> &CommandCatalog {
        &self.catalog
    }

    pub fn list_commands_by_category(&self, plugin: &str) -> Result<BTreeMap<String, Vec<String>>, CatalogError> {
        self.catalog.list_commands_by_category(plugin)
    }

    /// Builds the form for `command`.
    ///
    /// `encoded_credentials` are the query-string values carried by the form
    /// request; values that fail to decode are dropped with a warning.
    pub fn request_form(
        &self,
        plugin: &str,
        command: &str,
        appliances: &[String],
        encoded_credentials: &[String],
        session_key: &SessionKey,
    ) -> Result<FormDescription, CatalogError> {
        let entry = self.catalog.resolve(plugin, command)?;
        info!(plugin = %plugin, command = %entry.descriptor.name, "form requested");

        let credentials: Vec<String> = encoded_credentials
            .iter()
            .filter_map(|raw| {
                decode_query_field(raw, session_key)
                    .inspect_err(|error| warn!(plugin = %plugin, command = %command, error = %error, "dropping undecodable credential"))
                    .ok()
            })
            .collect();
        let context = FormContext {
            appliances,
            credentials: &credentials,
        };
        Ok(self.forms.build(&entry.descriptor, &context))
    }

    /// Handles a submission stamped with the current time.
    pub fn submit(&self, plugin: &str, submission: &Submission, session_key: &SessionKey) -> SubmissionOutcome {
        self.submit_with_context(plugin, submission, session_key, SubmissionContext::new())
    }

    /// Handles a submission. Every failure is absorbed into the outcome.
    pub fn submit_with_context(
        &self,
        plugin: &str,
        submission: &Submission,
        session_key: &SessionKey,
        context: SubmissionContext,
    ) -> SubmissionOutcome {
        let packaged = self.run_submission(plugin, submission, session_key, &context);
        let fragment = self.renderer.render(&packaged);
        SubmissionOutcome { packaged, fragment }
    }

    /// Reads a persisted request history log.
    pub fn history(&self, id: &str) -> Result<Option<String>, HistoryLogError> {
        self.invoker.history().read(id)
    }

    fn run_submission(
        &self,
        plugin: &str,
        submission: &Submission,
        session_key: &SessionKey,
        context: &SubmissionContext,
    ) -> PackagedResult {
        let Some(command) = submission.callable() else {
            warn!(plugin = %plugin, "submission does not name a command");
            return rejected("", context, "submission does not name a command".to_string());
        };
        info!(plugin = %plugin, command = %command, timestamp = %context.timestamp(), "submission received");

        let entry = match self.catalog.resolve(plugin, command) {
            Ok(entry) => entry,
            Err(error) => {
                warn!(plugin = %plugin, command = %command, error = %error, "submission for unknown command");
                return rejected(command, context, error.to_string());
            }
        };
        let descriptor = &entry.descriptor;

        let arguments = match self.coercer.coerce(descriptor, submission, session_key, context) {
            Ok(arguments) => arguments,
            Err(error) => {
                warn!(command = %descriptor.canonical_id(), error = %error, "failed to coerce submission");
                return rejected(&descriptor.name, context, error.to_string());
            }
        };

        let result = self.invoker.invoke(&entry, &arguments, context);
        let download = self.packager.package(&descriptor.name, &arguments, context);
        PackagedResult {
            command: descriptor.name.clone(),
            timestamp: context.timestamp().to_string(),
            display_output: result.display_output,
            download,
            history_id: result.history_id,
            error: result.error,
        }
    }
}

fn rejected(command: &str, context: &SubmissionContext, error: String) -> PackagedResult {
    PackagedResult {
        command: command.to_string(),
        timestamp: context.timestamp().to_string(),
        display_output: format!("Unable to perform action: {}", escape_markup(&error)),
        download: None,
        history_id: None,
        error: Some(error),
    }
}
