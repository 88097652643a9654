use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Name of the field identifying the command within a submission.
pub const CALLABLE_FIELD: &str = "callable";

/// Raw values posted back from a form, already extracted from the transport.
///
/// A field may carry zero, one or many strings. List fields are also accepted
/// under their bracketed name (`appliances[]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default)]
    fields: IndexMap<String, Vec<String>>,
    #[serde(default)]
    uploads: IndexMap<String, Vec<u8>>,
}

impl Submission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a submission whose `callable` field names `command`.
    pub fn for_command(command: &str) -> Self {
        let mut submission = Self::new();
        submission.push_value(CALLABLE_FIELD, command);
        submission
    }

    /// Builds a submission from `(name, value)` pairs as a form decoder yields them.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut submission = Self::new();
        for (name, value) in pairs {
            submission.fields.entry(name.into()).or_default().push(value.into());
        }
        submission
    }

    pub fn push_value(&mut self, name: &str, value: impl Into<String>) {
        self.fields.entry(name.to_string()).or_default().push(value.into());
    }

    pub fn with_value(mut self, name: &str, value: impl Into<String>) -> Self {
        self.push_value(name, value);
        self
    }

    pub fn with_values<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let entry = self.fields.entry(name.to_string()).or_default();
        entry.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_upload(mut self, name: &str, content: Vec<u8>) -> Self {
        self.uploads.insert(name.to_string(), content);
        self
    }

    /// All values submitted for `name`, falling back to `name[]`.
    pub fn values(&self, name: &str) -> &[String] {
        if let Some(values) = self.fields.get(name) {
            return values;
        }
        self.fields.get(&format!("{name}[]")).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value submitted for `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        !self.values(name).is_empty()
    }

    pub fn upload(&self, name: &str) -> Option<&[u8]> {
        self.uploads.get(name).map(Vec::as_slice)
    }

    /// The command name this submission targets.
    pub fn callable(&self) -> Option<&str> {
        self.first(CALLABLE_FIELD).map(str::trim).filter(|name| !name.is_empty())
    }
}
