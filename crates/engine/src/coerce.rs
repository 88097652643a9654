//! Value coercion: rebuilding typed arguments from submitted strings.
//!
//! Coercion walks the descriptor's parameters in declaration order and
//! always produces exactly one value per declared parameter.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use cmdbridge_types::{ArgValue, CoercedArguments, CommandDescriptor, ParamDefault, Submission};
use cmdbridge_util::credential_codec::decode_field;
use cmdbridge_util::{CodecError, SessionKey, sanitize_file_component};
use thiserror::Error;
use tracing::debug;

use crate::classify::{CREDENTIALS, FILE_IN, OUT_DIR, OUT_FILE, WEB_FLAG};
use crate::context::SubmissionContext;

/// Values accepted as a checked checkbox.
const TRUTHY: [&str; 3] = ["true", "on", "1"];

#[derive(Debug, Error)]
pub enum CoercionError {
    #[error("failed to prepare output location {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode submitted credentials: {0}")]
    Credentials(#[from] CodecError),
}

/// Turns submissions back into [`CoercedArguments`].
#[derive(Debug, Clone)]
pub struct Coercer {
    staging_root: PathBuf,
}

impl Coercer {
    pub fn new(staging_root: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: staging_root.into(),
        }
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Coerces `submission` against `descriptor`.
    ///
    /// Output locations are prepared as a side effect: the private `out_dir`
    /// leaf is created, as is the parent of `out_file`.
    pub fn coerce(
        &self,
        descriptor: &CommandDescriptor,
        submission: &Submission,
        session_key: &SessionKey,
        context: &SubmissionContext,
    ) -> Result<CoercedArguments, CoercionError> {
        let mut arguments = CoercedArguments::new();
        for parameter in &descriptor.parameters {
            let name = parameter.name.as_str();
            let value = match &parameter.default {
                ParamDefault::Bool(_) if name == WEB_FLAG => ArgValue::Bool(true),
                ParamDefault::Bool(_) => ArgValue::Bool(submission.first(name).is_some_and(is_truthy)),

                ParamDefault::List(_) if name == CREDENTIALS => ArgValue::List(
                    submission
                        .values(name)
                        .iter()
                        .map(|field| decode_field(field, session_key))
                        .collect::<Result<_, _>>()?,
                ),
                ParamDefault::List(_) => ArgValue::List(submission.values(name).to_vec()),

                ParamDefault::Text(_) if name == OUT_DIR => ArgValue::Text(self.private_out_dir(descriptor, context)?),
                ParamDefault::Text(default) if name == OUT_FILE => {
                    ArgValue::Text(self.out_file(descriptor, default, context)?)
                }
                ParamDefault::Text(default) => {
                    ArgValue::Text(non_empty(submission, name).unwrap_or(default).to_string())
                }

                ParamDefault::Integer(default) => ArgValue::Integer(
                    non_empty(submission, name)
                        .and_then(|raw| raw.trim().parse::<i64>().ok())
                        .filter(|number| *number != 0)
                        .unwrap_or(*default),
                ),
                ParamDefault::Float(default) => ArgValue::Float(
                    non_empty(submission, name)
                        .and_then(|raw| raw.trim().parse::<f64>().ok())
                        .filter(|number| *number != 0.0)
                        .unwrap_or(*default),
                ),

                ParamDefault::Absent if name == FILE_IN => submission
                    .upload(name)
                    .map(|content| ArgValue::Bytes(content.to_vec()))
                    .unwrap_or(ArgValue::Absent),
                ParamDefault::Absent if name == OUT_FILE => ArgValue::Absent,
                ParamDefault::Absent => non_empty(submission, name)
                    .map(|text| ArgValue::Text(text.to_string()))
                    .unwrap_or(ArgValue::Absent),
                ParamDefault::Opaque(default) => non_empty(submission, name)
                    .map(|text| ArgValue::Text(text.to_string()))
                    .unwrap_or_else(|| ArgValue::Opaque(default.clone())),
            };
            arguments.insert(name, value);
        }
        Ok(arguments)
    }

    /// `{staging_root}/web/{command}`
    fn command_dir(&self, descriptor: &CommandDescriptor) -> String {
        let root = self.staging_root.to_string_lossy().replace('\\', "/");
        format!(
            "{}/web/{}",
            root.trim_end_matches('/'),
            sanitize_file_component(&descriptor.name)
        )
    }

    /// Creates `{staging_root}/web/{command}/{timestamp}-{id}`. The leaf is
    /// created non-recursively so an existing directory is never reused.
    fn private_out_dir(&self, descriptor: &CommandDescriptor, context: &SubmissionContext) -> Result<String, CoercionError> {
        let parent = self.command_dir(descriptor);
        create_dir_all(Path::new(&parent))?;
        let leaf = format!("{parent}/{}-{}", context.timestamp(), context.short_id());
        fs::create_dir(&leaf).map_err(|source| CoercionError::Staging {
            path: PathBuf::from(&leaf),
            source,
        })?;
        debug!(command = %descriptor.name, out_dir = %leaf, "created private output directory");
        Ok(leaf)
    }

    /// `{staging_root}/web/{command}/{timestamp}-{command}{extension}`,
    /// keeping the extension of the declared default.
    fn out_file(&self, descriptor: &CommandDescriptor, default: &str, context: &SubmissionContext) -> Result<String, CoercionError> {
        let parent = self.command_dir(descriptor);
        create_dir_all(Path::new(&parent))?;
        let extension = Path::new(default)
            .extension()
            .map(|extension| format!(".{}", extension.to_string_lossy()))
            .unwrap_or_default();
        Ok(format!(
            "{parent}/{}-{}{extension}",
            context.timestamp(),
            sanitize_file_component(&descriptor.name)
        ))
    }
}

fn create_dir_all(path: &Path) -> Result<(), CoercionError> {
    fs::create_dir_all(path).map_err(|source| CoercionError::Staging {
        path: path.to_path_buf(),
        source,
    })
}

fn non_empty<'a>(submission: &'a Submission, name: &str) -> Option<&'a str> {
    submission.first(name).filter(|value| !value.is_empty())
}

fn is_truthy(value: &str) -> bool {
    TRUTHY.iter().any(|truthy| value.trim().eq_ignore_ascii_case(truthy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdbridge_types::Parameter;
    use cmdbridge_util::credential_codec::encode_field;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn descriptor(parameters: Vec<Parameter>) -> CommandDescriptor {
        CommandDescriptor {
            plugin: "system".into(),
            name: "audit".into(),
            category: "reports".into(),
            doc: String::new(),
            parameters,
        }
    }

    fn context() -> SubmissionContext {
        SubmissionContext::with_values("20240101-000000", Uuid::nil())
    }

    fn coerce(descriptor: &CommandDescriptor, submission: &Submission) -> CoercedArguments {
        let staging = tempdir().unwrap();
        Coercer::new(staging.path())
            .coerce(descriptor, submission, &SessionKey::from_cookie("cookie"), &context())
            .expect("coerce")
    }

    #[test]
    fn booleans_follow_submission_and_web_is_forced() {
        let descriptor = descriptor(vec![
            Parameter::new("web", ParamDefault::Bool(false)),
            Parameter::new("save_config", ParamDefault::Bool(true)),
            Parameter::new("quiesce", ParamDefault::Bool(false)),
        ]);
        let submission = Submission::new().with_value("quiesce", "on");
        let arguments = coerce(&descriptor, &submission);
        assert_eq!(arguments.get_bool("web"), Some(true));
        assert_eq!(arguments.get_bool("save_config"), Some(false));
        assert_eq!(arguments.get_bool("quiesce"), Some(true));
    }

    #[test]
    fn lists_preserve_order_and_duplicates() {
        let descriptor = descriptor(vec![
            Parameter::new("appliances", ParamDefault::List(vec![])),
            Parameter::new("domains", ParamDefault::List(vec![])),
        ]);
        let submission = Submission::from_pairs([
            ("appliances[]", "dp2"),
            ("appliances[]", "dp1"),
            ("domains", "a"),
            ("domains", "a"),
        ]);
        let arguments = coerce(&descriptor, &submission);
        assert_eq!(arguments.get_list("appliances"), Some(["dp2".to_string(), "dp1".to_string()].as_slice()));
        assert_eq!(arguments.get_list("domains"), Some(["a".to_string(), "a".to_string()].as_slice()));
    }

    #[test]
    fn credentials_are_decoded_with_session_key() {
        let key = SessionKey::from_cookie("cookie");
        let descriptor = descriptor(vec![Parameter::new("credentials", ParamDefault::List(vec![]))]);
        let submission = Submission::new().with_value("credentials[]", encode_field("admin:secret", &key));
        let arguments = coerce(&descriptor, &submission);
        assert_eq!(arguments.get_list("credentials"), Some(["admin:secret".to_string()].as_slice()));

        let broken = Submission::new().with_value("credentials", "%%%");
        let staging = tempdir().unwrap();
        let error = Coercer::new(staging.path())
            .coerce(&descriptor, &broken, &key, &context())
            .unwrap_err();
        assert!(matches!(error, CoercionError::Credentials(_)));
    }

    #[test]
    fn text_falls_back_to_default_when_empty() {
        let descriptor = descriptor(vec![
            Parameter::new("domain", ParamDefault::Text("default".into())),
            Parameter::new("comment", ParamDefault::Text("none".into())),
            Parameter::new("note", ParamDefault::Absent),
        ]);
        let submission = Submission::new().with_value("domain", "").with_value("comment", "hello");
        let arguments = coerce(&descriptor, &submission);
        assert_eq!(arguments.get_str("domain"), Some("default"));
        assert_eq!(arguments.get_str("comment"), Some("hello"));
        assert!(arguments.get("note").is_some_and(ArgValue::is_absent));
    }

    #[test]
    fn zero_never_overrides_numeric_default() {
        let descriptor = descriptor(vec![
            Parameter::new("delay", ParamDefault::Integer(5)),
            Parameter::new("timeout", ParamDefault::Integer(120)),
            Parameter::new("interval", ParamDefault::Float(1.5)),
            Parameter::new("retries", ParamDefault::Integer(3)),
        ]);
        let submission = Submission::new()
            .with_value("delay", "0")
            .with_value("timeout", "30")
            .with_value("interval", "0.0")
            .with_value("retries", "many");
        let arguments = coerce(&descriptor, &submission);
        assert_eq!(arguments.get_integer("delay"), Some(5));
        assert_eq!(arguments.get_integer("timeout"), Some(30));
        assert_eq!(arguments.get_float("interval"), Some(1.5));
        assert_eq!(arguments.get_integer("retries"), Some(3));
    }

    #[test]
    fn out_file_keeps_default_extension() {
        let staging = tempdir().unwrap();
        let descriptor = descriptor(vec![Parameter::new("out_file", ParamDefault::Text("report.xlsx".into()))]);
        let arguments = Coercer::new(staging.path())
            .coerce(&descriptor, &Submission::new(), &SessionKey::from_bytes(Vec::new()), &context())
            .unwrap();
        let root = staging.path().to_string_lossy().replace('\\', "/");
        assert_eq!(
            arguments.get_str("out_file"),
            Some(format!("{root}/web/audit/20240101-000000-audit.xlsx").as_str())
        );
        assert!(staging.path().join("web").join("audit").is_dir());
    }

    #[test]
    fn absent_out_file_stays_absent() {
        let descriptor = descriptor(vec![Parameter::new("out_file", ParamDefault::Absent)]);
        let arguments = coerce(&descriptor, &Submission::new());
        assert!(arguments.get("out_file").is_some_and(ArgValue::is_absent));
    }

    #[test]
    fn out_dir_is_a_fresh_private_leaf() {
        let staging = tempdir().unwrap();
        let coercer = Coercer::new(staging.path());
        let descriptor = descriptor(vec![Parameter::new("out_dir", ParamDefault::Text("tmp".into()))]);
        let key = SessionKey::from_bytes(Vec::new());

        let arguments = coercer.coerce(&descriptor, &Submission::new(), &key, &context()).unwrap();
        let out_dir = arguments.get_str("out_dir").expect("out_dir").to_string();
        assert!(out_dir.ends_with("/web/audit/20240101-000000-00000000"));
        assert!(Path::new(&out_dir).is_dir());

        // same timestamp and id again: the leaf already exists
        let error = coercer.coerce(&descriptor, &Submission::new(), &key, &context()).unwrap_err();
        assert!(matches!(error, CoercionError::Staging { .. }));

        let other = SubmissionContext::with_values("20240101-000000", Uuid::new_v4());
        let arguments = coercer.coerce(&descriptor, &Submission::new(), &key, &other).unwrap();
        assert_ne!(arguments.get_str("out_dir"), Some(out_dir.as_str()));
    }

    #[test]
    fn uploads_bind_to_file_in() {
        let descriptor = descriptor(vec![Parameter::new("file_in", ParamDefault::Absent)]);
        let submission = Submission::new().with_upload("file_in", b"<config/>".to_vec());
        let arguments = coerce(&descriptor, &submission);
        assert_eq!(arguments.get("file_in").and_then(ArgValue::as_bytes), Some(b"<config/>".as_slice()));
        assert!(coerce(&descriptor, &Submission::new()).get("file_in").is_some_and(ArgValue::is_absent));
    }

    #[test]
    fn every_declared_parameter_is_present() {
        let descriptor = descriptor(vec![
            Parameter::new("appliances", ParamDefault::List(vec![])),
            Parameter::new("credentials", ParamDefault::List(vec![])),
            Parameter::new("web", ParamDefault::Bool(false)),
            Parameter::new("mapping", ParamDefault::Opaque(serde_json::json!({"a": 1}))),
        ]);
        let arguments = coerce(&descriptor, &Submission::new());
        let names: Vec<_> = arguments.names().collect();
        assert_eq!(names, vec!["appliances", "credentials", "web", "mapping"]);
        assert_eq!(arguments.get("mapping"), Some(&ArgValue::Opaque(serde_json::json!({"a": 1}))));
    }
}
