use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use cmdbridge_engine::Bridge;
use cmdbridge_registry::BridgeConfig;
use cmdbridge_types::Submission;
use cmdbridge_util::credential_codec::encode_field;
use cmdbridge_util::{SessionKey, expand_tilde};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod demo;

const DEFAULT_SESSION: &str = "cmdbridge-cli";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();

    let config = match matches.get_one::<String>("config") {
        Some(path) => BridgeConfig::load_from(&expand_tilde(path))?,
        None => BridgeConfig::load()?,
    };
    debug!(?config, "loaded bridge config");
    let bridge = Arc::new(Bridge::new(demo::catalog()?, &config));
    let session = matches
        .get_one::<String>("session")
        .map(String::as_str)
        .unwrap_or(DEFAULT_SESSION);
    let session_key = SessionKey::from_cookie(session);
    let plugin = matches
        .get_one::<String>("plugin")
        .cloned()
        .unwrap_or_else(|| demo::PLUGIN.to_string());

    match matches.subcommand() {
        Some(("list", _)) => {
            let listing = bridge.list_commands_by_category(&plugin)?;
            for (category, commands) in listing {
                println!("{category}");
                for command in commands {
                    println!("  {command}");
                }
            }
        }
        Some(("form", sub)) => {
            let command = required(sub, "command")?;
            let appliances = many(sub, "appliance");
            let credentials: Vec<String> = many(sub, "credential")
                .iter()
                .map(|credential| encode_field(credential, &session_key))
                .collect();
            let form = bridge.request_form(&plugin, &command, &appliances, &credentials, &session_key)?;
            println!("{}", serde_json::to_string_pretty(&form)?);
        }
        Some(("submit", sub)) => {
            let submission = build_submission(sub, &session_key)?;
            let worker = Arc::clone(&bridge);
            let outcome =
                tokio::task::spawn_blocking(move || worker.submit(&plugin, &submission, &session_key)).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Some(("history", sub)) => {
            let id = required(sub, "id")?;
            match bridge.history(&id)? {
                Some(history) => println!("{history}"),
                None => bail!("no request history named {id}"),
            }
        }
        _ => {
            build_cli().print_help()?;
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    let appliance = Arg::new("appliance")
        .long("appliance")
        .short('a')
        .action(ArgAction::Append)
        .help("Appliance to run against (repeatable)");
    let credential = Arg::new("credential")
        .long("credential")
        .short('c')
        .action(ArgAction::Append)
        .help("username:password for each appliance (repeatable)");

    Command::new("cmdbridge")
        .about("Derive forms for cataloged commands and submit them")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .action(ArgAction::Set)
                .help("Path to bridge.json"),
        )
        .arg(
            Arg::new("plugin")
                .long("plugin")
                .short('p')
                .global(true)
                .action(ArgAction::Set)
                .help("Plugin owning the command (default: demo)"),
        )
        .arg(
            Arg::new("session")
                .long("session")
                .global(true)
                .action(ArgAction::Set)
                .help("Session cookie value the credential key is derived from"),
        )
        .subcommand(Command::new("list").about("List commands by category"))
        .subcommand(
            Command::new("form")
                .about("Print the form derived for a command as JSON")
                .arg(Arg::new("command").required(true))
                .arg(appliance.clone())
                .arg(credential.clone()),
        )
        .subcommand(
            Command::new("submit")
                .about("Submit a command and print the packaged result")
                .arg(Arg::new("command").required(true))
                .arg(
                    Arg::new("field")
                        .long("field")
                        .short('f')
                        .action(ArgAction::Append)
                        .help("name=value pair (repeatable)"),
                )
                .arg(
                    Arg::new("upload")
                        .long("upload")
                        .action(ArgAction::Append)
                        .help("name=path of a file to upload (repeatable)"),
                )
                .arg(appliance)
                .arg(credential),
        )
        .subcommand(
            Command::new("history")
                .about("Print a persisted request history log")
                .arg(Arg::new("id").required(true)),
        )
}

fn build_submission(matches: &ArgMatches, session_key: &SessionKey) -> Result<Submission> {
    let command = required(matches, "command")?;
    let mut submission = Submission::for_command(&command)
        .with_values("appliances[]", many(matches, "appliance"))
        .with_values(
            "credentials[]",
            many(matches, "credential")
                .iter()
                .map(|credential| encode_field(credential, session_key)),
        );
    for field in many(matches, "field") {
        let (name, value) = split_pair(&field)?;
        submission.push_value(name, value);
    }
    for upload in many(matches, "upload") {
        let (name, path) = split_pair(&upload)?;
        let content = fs::read(expand_tilde(path)).with_context(|| format!("reading upload {path}"))?;
        submission = submission.with_upload(name, content);
    }
    Ok(submission)
}

fn split_pair(pair: &str) -> Result<(&str, &str)> {
    match pair.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => bail!("expected name=value, got '{pair}'"),
    }
}

fn required(matches: &ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .with_context(|| format!("missing <{name}>"))
}

fn many(matches: &ArgMatches, name: &str) -> Vec<String> {
    matches
        .get_many::<String>(name)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}
