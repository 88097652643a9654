use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use cmdbridge_engine::{Bridge, FieldClassifier, NO_APPLIANCES_MESSAGE, SubmissionContext};
use cmdbridge_registry::{BridgeConfig, CommandCatalog, CommandRegistration, DomainSets, ParamDefault};
use cmdbridge_types::{ArgValue, CoercedArguments, CommandOutput, FieldKind, Submission};
use cmdbridge_util::credential_codec::encode_field;
use cmdbridge_util::{InMemoryHistoryLog, SessionKey};
use tempfile::{TempDir, tempdir};
use uuid::Uuid;
use zip::ZipArchive;

const TIMESTAMP: &str = "20240101-000000";

fn config(work: &TempDir) -> BridgeConfig {
    BridgeConfig {
        staging_root: work.path().join("tmp"),
        static_root: work.path().join("static"),
        history_root: work.path().join("history"),
        ..BridgeConfig::default()
    }
}

fn context() -> SubmissionContext {
    SubmissionContext::with_values(TIMESTAMP, Uuid::new_v4())
}

/// Echoes every argument it received, one per line.
fn echo(arguments: &CoercedArguments) -> anyhow::Result<CommandOutput> {
    let lines: Vec<String> = arguments
        .iter()
        .map(|(name, value)| format!("{name}={}", serde_json::to_string(value).unwrap_or_default()))
        .collect();
    Ok(CommandOutput::new(lines.join("\n"), "echo"))
}

fn export_objects(arguments: &CoercedArguments) -> anyhow::Result<CommandOutput> {
    let out_dir = Path::new(arguments.get_str("out_dir").unwrap_or_default());
    for appliance in arguments.get_list("appliances").unwrap_or_default() {
        let dir = out_dir.join(appliance);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("export.xml"), format!("<export appliance=\"{appliance}\"/>"))?;
    }
    Ok(CommandOutput::new("exported", "POST /mgmt/actionqueue/default"))
}

fn audit(arguments: &CoercedArguments) -> anyhow::Result<CommandOutput> {
    let out_file = arguments.get_str("out_file").unwrap_or_default();
    fs::write(out_file, "appliance,expiry\ndp1,2030-01-01\n")?;
    Ok(CommandOutput::new("audited", "GET /mgmt/status/default/CryptoCertificate"))
}

fn catalog() -> CommandCatalog {
    let mut catalog = CommandCatalog::new();
    catalog
        .register(
            CommandRegistration::new("system", "echo")
                .category("diagnostics")
                .param("appliances", ParamDefault::List(vec![]))
                .param("credentials", ParamDefault::List(vec![]))
                .param("domain", ParamDefault::Text("default".into()))
                .param("objects", ParamDefault::List(vec!["a".into(), "b".into()]))
                .param("save_config", ParamDefault::Bool(true))
                .param("quiesce", ParamDefault::Bool(false))
                .param("delay", ParamDefault::Integer(5))
                .param("web", ParamDefault::Bool(false))
                .handler(echo),
        )
        .unwrap();
    catalog
        .register(
            CommandRegistration::new("system", "export_objects")
                .category("configuration")
                .param("appliances", ParamDefault::List(vec![]))
                .param("out_dir", ParamDefault::Text("tmp".into()))
                .param("web", ParamDefault::Bool(false))
                .handler(export_objects),
        )
        .unwrap();
    catalog
        .register(
            CommandRegistration::new("crypto", "audit")
                .category("certificates")
                .param("appliances", ParamDefault::List(vec![]))
                .param("out_file", ParamDefault::Text("report.xlsx".into()))
                .param("web", ParamDefault::Bool(false))
                .handler(audit),
        )
        .unwrap();
    catalog
}

fn bridge(work: &TempDir) -> (Bridge, Arc<InMemoryHistoryLog>) {
    let history = Arc::new(InMemoryHistoryLog::new());
    let bridge = Bridge::new(catalog(), &config(work)).with_history_log(history.clone());
    (bridge, history)
}

#[test]
fn web_flag_is_never_shown_and_always_true() {
    let classifier = FieldClassifier::new(DomainSets::empty());
    assert_eq!(
        classifier.classify("web", &ParamDefault::Bool(false)).kind,
        FieldKind::Skipped
    );

    let work = tempdir().unwrap();
    let (bridge, _) = bridge(&work);
    let key = SessionKey::from_cookie("cookie");
    let form = bridge.request_form("system", "echo", &[], &[], &key).unwrap();
    assert!(form.field("web").is_none());

    let submission = form.default_submission().with_value("appliances[]", "dp1");
    let outcome = bridge.submit_with_context("system", &submission, &key, context());
    assert!(outcome.packaged.display_output.contains(r#"web={"type":"bool","value":true}"#));
}

#[test]
fn empty_appliances_return_fixed_message_without_invoking() {
    let work = tempdir().unwrap();
    let (bridge, history) = bridge(&work);
    let key = SessionKey::from_cookie("cookie");

    let outcome = bridge.submit_with_context("system", &Submission::for_command("echo"), &key, context());
    assert_eq!(outcome.packaged.display_output, NO_APPLIANCES_MESSAGE);
    assert!(outcome.packaged.error.is_none());
    assert_eq!(history.len(), 1);
}

#[test]
fn submitted_zero_keeps_numeric_default() {
    let work = tempdir().unwrap();
    let (bridge, _) = bridge(&work);
    let key = SessionKey::from_cookie("cookie");
    let submission = Submission::for_command("echo")
        .with_value("appliances[]", "dp1")
        .with_value("delay", "0");
    let outcome = bridge.submit_with_context("system", &submission, &key, context());
    assert!(outcome.packaged.display_output.contains(r#"delay={"type":"integer","value":5}"#));
}

#[test]
fn out_file_is_synthesized_from_timestamp_and_command() {
    let work = tempdir().unwrap();
    let (bridge, _) = bridge(&work);
    let key = SessionKey::from_cookie("cookie");
    let submission = Submission::for_command("audit").with_value("appliances[]", "dp1");
    let outcome = bridge.submit_with_context("crypto", &submission, &key, context());

    let download = outcome.packaged.download.expect("download");
    assert_eq!(download.filename, "20240101-000000-audit.xlsx");
    assert!(work.path().join("tmp/web/audit/20240101-000000-audit.xlsx").is_file());
    assert!(work.path().join("static/tmp/20240101-000000-audit.xlsx").is_file());
}

#[test]
fn directory_output_is_archived_per_appliance_set() {
    let work = tempdir().unwrap();
    let (bridge, _) = bridge(&work);
    let key = SessionKey::from_cookie("cookie");
    let submission = Submission::for_command("export_objects").with_values("appliances[]", ["dp1", "dp2"]);
    let outcome = bridge.submit_with_context("system", &submission, &key, context());

    let download = outcome.packaged.download.clone().expect("download");
    assert_eq!(download.filename, "20240101-000000-export_objects-dp1-dp2.zip");
    assert!(outcome.fragment.contains(&format!("/static/tmp/{}", download.filename)));

    let archive = File::open(work.path().join("static").join(&download.static_path)).unwrap();
    let mut archive = ZipArchive::new(archive).unwrap();
    assert!(archive.by_name("dp1/export.xml").is_ok());
    assert!(archive.by_name("dp2/export.xml").is_ok());
}

#[test]
fn concurrent_submissions_get_private_output_directories() {
    let work = tempdir().unwrap();
    let (bridge, _) = bridge(&work);
    let key = SessionKey::from_cookie("cookie");
    let submission = Submission::for_command("export_objects").with_value("appliances[]", "dp1");

    bridge.submit_with_context("system", &submission, &key, context());
    bridge.submit_with_context("system", &submission, &key, context());

    let staged: Vec<_> = fs::read_dir(work.path().join("tmp/web/export_objects"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(staged.len(), 2);
    assert!(staged.iter().all(|name| name.starts_with(TIMESTAMP)));
}

#[test]
fn untouched_form_round_trips_to_defaults() {
    let work = tempdir().unwrap();
    let (bridge, _) = bridge(&work);
    let key = SessionKey::from_cookie("cookie");
    let form = bridge.request_form("system", "echo", &[], &[], &key).unwrap();
    let submission = form.default_submission().with_value("appliances[]", "dp1");
    let outcome = bridge.submit_with_context("system", &submission, &key, context());
    let output = outcome.packaged.display_output;

    for (name, expected) in [
        ("domain", ArgValue::Text("default".into())),
        ("objects", ArgValue::List(vec!["a".into(), "b".into()])),
        ("save_config", ArgValue::Bool(true)),
        ("quiesce", ArgValue::Bool(false)),
        ("delay", ArgValue::Integer(5)),
    ] {
        let line = format!("{name}={}", serde_json::to_string(&expected).unwrap());
        assert!(output.contains(&line), "missing {line} in {output}");
    }
}

#[test]
fn credentials_travel_encoded_and_arrive_decoded() {
    let work = tempdir().unwrap();
    let (bridge, _) = bridge(&work);
    let key = SessionKey::from_cookie("9x4h");
    let submission = Submission::for_command("echo")
        .with_value("appliances[]", "dp1")
        .with_value("credentials[]", encode_field("admin:secret", &key));
    let outcome = bridge.submit_with_context("system", &submission, &key, context());
    assert!(outcome.packaged.display_output.contains("admin:secret"));
}

#[test]
fn categories_are_listed_in_sorted_order() {
    let work = tempdir().unwrap();
    let (bridge, _) = bridge(&work);
    let listing = bridge.list_commands_by_category("system").unwrap();
    assert_eq!(listing.keys().collect::<Vec<_>>(), vec!["configuration", "diagnostics"]);
}
