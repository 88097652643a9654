pub mod credential_codec;
pub mod history_log;
pub mod path_processing;
pub mod text_processing;

pub use credential_codec::{CodecError, SessionKey};
pub use history_log::{FileHistoryLog, HistoryLog, HistoryLogError, InMemoryHistoryLog};
pub use path_processing::{expand_tilde, sanitize_file_component};
pub use text_processing::{dedent_doc, escape_markup, label_for, redact_sensitive, summarize_arguments};
