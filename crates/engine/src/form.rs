//! Form derivation for the request-for-form path.

use std::fmt::Debug;
use std::sync::Arc;

use cmdbridge_types::{CommandDescriptor, FieldKind, FormDescription, FormField, OptionSet};
use cmdbridge_util::{dedent_doc, label_for};
use pulldown_cmark::{Options, Parser, html};
use tracing::debug;

use crate::classify::FieldClassifier;

/// Session context a form is requested for.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormContext<'a> {
    /// Appliances selected in the session
    pub appliances: &'a [String],
    /// Decoded `username:password` credentials, parallel to `appliances`
    pub credentials: &'a [String],
}

/// Supplies the options offered by object-class selects.
///
/// Implementations may narrow the domain to what actually exists on the
/// selected appliances; they must not block for long, since forms are built
/// on the request path.
pub trait OptionsProvider: Send + Sync + Debug {
    fn object_options(&self, field: &str, domain: &OptionSet, context: &FormContext<'_>) -> OptionSet;
}

/// Offers the configured domain unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct DomainOptions;

impl OptionsProvider for DomainOptions {
    fn object_options(&self, _field: &str, domain: &OptionSet, _context: &FormContext<'_>) -> OptionSet {
        Arc::clone(domain)
    }
}

/// Builds [`FormDescription`]s from command descriptors.
#[derive(Debug, Clone)]
pub struct FormBuilder {
    classifier: FieldClassifier,
    options: Arc<dyn OptionsProvider>,
}

impl FormBuilder {
    pub fn new(classifier: FieldClassifier) -> Self {
        Self::with_options_provider(classifier, Arc::new(DomainOptions))
    }

    pub fn with_options_provider(classifier: FieldClassifier, options: Arc<dyn OptionsProvider>) -> Self {
        Self { classifier, options }
    }

    /// Classifies every parameter and lays the visible ones out by group:
    /// text inputs, selects, uploads, then checkboxes. Declaration order is
    /// kept within a group; skipped parameters are left out.
    pub fn build(&self, descriptor: &CommandDescriptor, context: &FormContext<'_>) -> FormDescription {
        let mut fields: Vec<FormField> = descriptor
            .parameters
            .iter()
            .filter_map(|parameter| {
                let classification = self.classifier.classify_parameter(parameter);
                if classification.kind.is_skipped() {
                    return None;
                }
                let mut field = FormField {
                    name: parameter.name.clone(),
                    label: label_for(&parameter.name),
                    kind: classification.kind,
                    initial: classification.initial,
                    disclaimer: false,
                };
                if self.classifier.is_object_class(&parameter.name) {
                    self.refine_object_options(&mut field, context);
                }
                Some(field)
            })
            .collect();
        fields.sort_by_key(|field| field.kind.layout_group());

        debug!(
            command = %descriptor.canonical_id(),
            fields = fields.len(),
            appliances = context.appliances.len(),
            "built form"
        );

        let doc = dedent_doc(&descriptor.doc);
        FormDescription {
            plugin: descriptor.plugin.clone(),
            command: descriptor.name.clone(),
            label: label_for(&descriptor.name),
            help_html: render_help(&doc),
            doc,
            fields,
        }
    }

    fn refine_object_options(&self, field: &mut FormField, context: &FormContext<'_>) {
        let refined = match &field.kind {
            FieldKind::SingleSelect { options } | FieldKind::MultiSelect { options } => {
                self.options.object_options(&field.name, options, context)
            }
            _ => return,
        };
        field.kind = if matches!(field.kind, FieldKind::SingleSelect { .. }) {
            FieldKind::SingleSelect { options: refined }
        } else {
            FieldKind::MultiSelect { options: refined }
        };
        field.disclaimer = true;
    }
}

/// Renders Markdown help text to an HTML fragment.
pub fn render_help(doc: &str) -> String {
    if doc.trim().is_empty() {
        return String::new();
    }
    let parser = Parser::new_ext(doc, Options::ENABLE_TABLES);
    let mut rendered = String::new();
    html::push_html(&mut rendered, parser);
    rendered
}
