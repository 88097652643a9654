//! Form model produced for one command: the ordered, classified fields plus
//! the label and help text a renderer needs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Submission;

/// Ordered set of option names offered by a select field.
pub type OptionSet = Arc<[String]>;

/// UI and marshalling shape of a single parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Checkbox
    Boolean,
    /// Single-line text input
    Text,
    /// Masked text input
    Password,
    /// Repeatable text input producing a list of strings
    MultiValue,
    /// Choose one of `options`
    SingleSelect { options: OptionSet },
    /// Choose any of `options`
    MultiSelect { options: OptionSet },
    /// Upload control; the submitted bytes are passed through
    FileUpload,
    /// Not shown; the value is computed server-side or comes from the session
    Skipped,
}

impl FieldKind {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    pub fn options(&self) -> Option<&OptionSet> {
        match self {
            Self::SingleSelect { options } | Self::MultiSelect { options } => Some(options),
            _ => None,
        }
    }

    /// Layout group used to order fields within a form.
    pub fn layout_group(&self) -> LayoutGroup {
        match self {
            Self::Text | Self::Password | Self::MultiValue => LayoutGroup::TextInputs,
            Self::SingleSelect { .. } | Self::MultiSelect { .. } => LayoutGroup::Selects,
            Self::FileUpload => LayoutGroup::Uploads,
            Self::Boolean => LayoutGroup::Checkboxes,
            Self::Skipped => LayoutGroup::Hidden,
        }
    }
}

/// Forms list text inputs first, then selects, uploads and checkboxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayoutGroup {
    TextInputs,
    Selects,
    Uploads,
    Checkboxes,
    Hidden,
}

/// Value a field starts out with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum InitialValue {
    Empty,
    Text(String),
    Checked(bool),
    List(Vec<String>),
}

/// A single rendered input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// Parameter name; also the submitted field name
    pub name: String,
    /// Human-readable label (underscores replaced by spaces)
    pub label: String,
    pub kind: FieldKind,
    pub initial: InitialValue,
    /// Options depend on the selected appliances and may be incomplete
    #[serde(default)]
    pub disclaimer: bool,
}

/// Everything a renderer needs to draw the form for one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDescription {
    pub plugin: String,
    /// Command name; submitted back as the `callable` field
    pub command: String,
    pub label: String,
    /// Dedented docstring
    pub doc: String,
    /// Docstring rendered to HTML
    pub help_html: String,
    pub fields: Vec<FormField>,
}

impl FormDescription {
    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// The submission a user produces by pressing submit without touching
    /// any field.
    pub fn default_submission(&self) -> Submission {
        let mut submission = Submission::for_command(&self.command);
        for field in &self.fields {
            match &field.initial {
                InitialValue::Empty | InitialValue::Checked(false) => {}
                InitialValue::Checked(true) => submission.push_value(&field.name, "true"),
                InitialValue::Text(text) if text.is_empty() => {}
                InitialValue::Text(text) => submission.push_value(&field.name, text),
                InitialValue::List(items) => {
                    for item in items {
                        submission.push_value(&field.name, item);
                    }
                }
            }
        }
        submission
    }
}
