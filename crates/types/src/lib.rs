use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod form;
pub mod submission;

pub use form::{FieldKind, FormDescription, FormField, InitialValue, LayoutGroup, OptionSet};
pub use submission::{CALLABLE_FIELD, Submission};

/// Default value declared for a command parameter.
///
/// The variant (not the value) drives how the parameter is presented and how
/// submitted strings are turned back into an [`ArgValue`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamDefault {
    /// A flag (e.g. `localtime=false`)
    Bool(bool),
    /// A free-form string (e.g. `date_time_format="%A, %B %d"`)
    Text(String),
    /// An integer (e.g. `timeout=120`)
    Integer(i64),
    /// A floating point number (e.g. `delay=0.5`)
    Float(f64),
    /// A list of strings (e.g. `domains=[]`)
    List(Vec<String>),
    /// No value at all; the parameter is declared but has nothing to fall back to
    Absent,
    /// Any other value the command author declared; presented as plain text
    Opaque(Value),
}

impl ParamDefault {
    /// Short name of the default's shape, used in log lines.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::List(_) => "list",
            Self::Absent => "absent",
            Self::Opaque(_) => "opaque",
        }
    }

    /// Converts the declared default into the value a command receives when
    /// nothing overrides it.
    pub fn to_arg(&self) -> ArgValue {
        match self {
            Self::Bool(flag) => ArgValue::Bool(*flag),
            Self::Text(text) => ArgValue::Text(text.clone()),
            Self::Integer(number) => ArgValue::Integer(*number),
            Self::Float(number) => ArgValue::Float(*number),
            Self::List(items) => ArgValue::List(items.clone()),
            Self::Absent => ArgValue::Absent,
            Self::Opaque(value) => ArgValue::Opaque(value.clone()),
        }
    }
}

/// A single declared parameter: its name and default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub default: ParamDefault,
}

impl Parameter {
    pub fn new(name: impl Into<String>, default: ParamDefault) -> Self {
        Self {
            name: name.into(),
            default,
        }
    }
}

/// Static metadata for one invokable command.
///
/// Built once when the catalog is assembled and never mutated afterwards.
/// Identity is the `(plugin, name)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    /// Plugin the command belongs to (e.g. "system", "crypto")
    pub plugin: String,
    /// Command name as registered (e.g. "cert-audit")
    pub name: String,
    /// Author-declared grouping (e.g. "certificates")
    #[serde(default)]
    pub category: String,
    /// Free-form help text, usually Markdown
    #[serde(default)]
    pub doc: String,
    /// Parameters in declaration order
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl CommandDescriptor {
    /// Returns the declared parameter with the given name.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|parameter| parameter.name == name)
    }

    /// Whether the command declares a parameter with the given name.
    pub fn declares(&self, name: &str) -> bool {
        self.parameter(name).is_some()
    }

    /// `plugin:name`, used for log fields.
    pub fn canonical_id(&self) -> String {
        format!("{}:{}", self.plugin, self.name)
    }
}

/// Typed value handed to a command for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ArgValue {
    Bool(bool),
    Text(String),
    Integer(i64),
    Float(f64),
    List(Vec<String>),
    /// Raw uploaded bytes (`file_in`)
    Bytes(Vec<u8>),
    Absent,
    Opaque(Value),
}

impl ArgValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(number) => Some(*number),
            Self::Integer(number) => Some(*number as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Keyword arguments ready to be passed to a command, keyed by parameter name
/// and kept in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoercedArguments {
    values: IndexMap<String, ArgValue>,
}

impl CoercedArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ArgValue::as_bool)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ArgValue::as_str)
    }

    pub fn get_integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ArgValue::as_integer)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ArgValue::as_float)
    }

    pub fn get_list(&self, name: &str) -> Option<&[String]> {
        self.get(name).and_then(ArgValue::as_list)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What every command returns: markup to display and a plain-text history of
/// what it did (requests issued, responses received).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub display_output: String,
    pub history: String,
}

impl CommandOutput {
    pub fn new(display_output: impl Into<String>, history: impl Into<String>) -> Self {
        Self {
            display_output: display_output.into(),
            history: history.into(),
        }
    }
}

/// Outcome of one invocation, including the synthesized result when the
/// command failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResult {
    /// Markup-safe output for display
    pub display_output: String,
    /// History text persisted to the request history log
    pub history: String,
    /// One-line failure summary when the command did not complete
    #[serde(default)]
    pub error: Option<String>,
    /// Identifier of the persisted history log (`{timestamp}-{suffix}.log`)
    #[serde(default)]
    pub history_id: Option<String>,
}

impl InvocationResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

impl From<CommandOutput> for InvocationResult {
    fn from(output: CommandOutput) -> Self {
        Self {
            display_output: output.display_output,
            history: output.history,
            error: None,
            history_id: None,
        }
    }
}

/// Where a staged download can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadDescriptor {
    /// Base name of the staged file (e.g. "20240101-000000-export-certs-dp1.zip")
    pub filename: String,
    /// Public path under the static root (e.g. "tmp/20240101-000000-export-certs-dp1.zip")
    pub static_path: String,
}

impl fmt::Display for DownloadDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.static_path)
    }
}

/// The final, renderable result of one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagedResult {
    pub command: String,
    pub timestamp: String,
    pub display_output: String,
    #[serde(default)]
    pub download: Option<DownloadDescriptor>,
    #[serde(default)]
    pub history_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
