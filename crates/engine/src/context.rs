use chrono::Local;
use uuid::Uuid;

/// Format of submission timestamps (`20240101-000000`).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Per-submission identity shared by coercion, invocation and packaging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionContext {
    timestamp: String,
    id: Uuid,
}

impl SubmissionContext {
    /// Stamps a new submission with the local time and a random id.
    pub fn new() -> Self {
        Self {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            id: Uuid::new_v4(),
        }
    }

    pub fn with_values(timestamp: impl Into<String>, id: Uuid) -> Self {
        Self {
            timestamp: timestamp.into(),
            id,
        }
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// First eight hex digits of the id, used in directory names.
    pub fn short_id(&self) -> String {
        self.id.simple().to_string().chars().take(8).collect()
    }
}

impl Default for SubmissionContext {
    fn default() -> Self {
        Self::new()
    }
}
