//! Built-in `demo` plugin used to exercise the bridge from the command line.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cmdbridge_registry::{CatalogError, CommandCatalog, CommandOutput, CommandRegistration, ParamDefault};
use cmdbridge_types::CoercedArguments;
use cmdbridge_util::{redact_sensitive, summarize_arguments};

pub const PLUGIN: &str = "demo";

pub fn catalog() -> Result<CommandCatalog, CatalogError> {
    let mut catalog = CommandCatalog::new();
    catalog.register(
        CommandRegistration::new(PLUGIN, "echo_parameters")
            .category("diagnostics")
            .doc(
                "
                Echo every argument the command receives.

                Useful to check how a form submission is coerced:

                * checkboxes become booleans
                * numeric fields keep their default when left empty or zero
                * uploads arrive as raw bytes
                ",
            )
            .param("appliances", ParamDefault::List(vec![]))
            .param("credentials", ParamDefault::List(vec![]))
            .param("domain", ParamDefault::Text("default".into()))
            .param("objects", ParamDefault::List(vec![]))
            .param("StatusProvider", ParamDefault::Text("CPUUsage".into()))
            .param("admin_password", ParamDefault::Text(String::new()))
            .param("timeout", ParamDefault::Integer(120))
            .param("delay", ParamDefault::Float(0.5))
            .param("file_in", ParamDefault::Absent)
            .param("save_config", ParamDefault::Bool(false))
            .param("web", ParamDefault::Bool(false))
            .handler(echo_parameters),
    )?;
    catalog.register(
        CommandRegistration::new(PLUGIN, "export_configuration")
            .category("configuration")
            .doc("Write one export file per appliance and domain; the directory is downloaded as an archive.")
            .param("appliances", ParamDefault::List(vec![]))
            .param("domains", ParamDefault::List(vec!["default".into()]))
            .param("out_dir", ParamDefault::Text("tmp".into()))
            .param("web", ParamDefault::Bool(false))
            .handler(export_configuration),
    )?;
    catalog.register(
        CommandRegistration::new(PLUGIN, "certificate_report")
            .category("certificates")
            .doc("Write a CSV report listing the certificates of every appliance.")
            .param("appliances", ParamDefault::List(vec![]))
            .param("days_remaining", ParamDefault::Integer(30))
            .param("out_file", ParamDefault::Text("report.csv".into()))
            .param("web", ParamDefault::Bool(false))
            .handler(certificate_report),
    )?;
    Ok(catalog)
}

fn echo_parameters(arguments: &CoercedArguments) -> Result<CommandOutput> {
    let summary = redact_sensitive(&summarize_arguments(arguments));
    Ok(CommandOutput::new(format!("<pre>{summary}</pre>"), summary))
}

fn export_configuration(arguments: &CoercedArguments) -> Result<CommandOutput> {
    let out_dir = Path::new(arguments.get_str("out_dir").context("out_dir was not provided")?);
    let domains = arguments.get_list("domains").unwrap_or_default();
    let mut history = String::new();
    for appliance in arguments.get_list("appliances").unwrap_or_default() {
        let appliance_dir = out_dir.join(appliance);
        fs::create_dir_all(&appliance_dir).with_context(|| format!("creating {}", appliance_dir.display()))?;
        for domain in domains {
            let path = appliance_dir.join(format!("{domain}.xml"));
            fs::write(&path, format!("<export appliance=\"{appliance}\" domain=\"{domain}\"/>\n"))
                .with_context(|| format!("writing {}", path.display()))?;
            writeln!(history, "POST https://{appliance}:5554/mgmt/actionqueue/{domain} (Export)")?;
        }
    }
    Ok(CommandOutput::new(format!("<p>Exported {} domain(s)</p>", domains.len()), history))
}

fn certificate_report(arguments: &CoercedArguments) -> Result<CommandOutput> {
    let out_file = arguments.get_str("out_file").context("out_file was not provided")?;
    let days = arguments.get_integer("days_remaining").unwrap_or(30);
    let mut report = String::from("appliance,certificate,days_remaining\n");
    let mut history = String::new();
    for appliance in arguments.get_list("appliances").unwrap_or_default() {
        writeln!(report, "{appliance},{appliance}-identity,{days}")?;
        writeln!(history, "GET https://{appliance}:5554/mgmt/status/default/CryptoCertificate")?;
    }
    fs::write(out_file, report).with_context(|| format!("writing {out_file}"))?;
    Ok(CommandOutput::new(format!("<p>Report written for certificates expiring within {days} days</p>"), history))
}
