//! # Cmdbridge Engine
//!
//! Exposes cataloged commands through a generic form-and-submission bridge.
//! Nothing here is command specific: a command's form is derived from its
//! declared parameters, and submitted strings are coerced back into typed
//! arguments using the same rules.
//!
//! ## Usage
//!
//! ```rust
//! use cmdbridge_engine::Bridge;
//! use cmdbridge_registry::{BridgeConfig, CommandCatalog, CommandOutput, CommandRegistration, ParamDefault};
//! use cmdbridge_types::CoercedArguments;
//! use cmdbridge_util::SessionKey;
//!
//! fn set_log_level(arguments: &CoercedArguments) -> anyhow::Result<CommandOutput> {
//!     let level = arguments.get_str("level").unwrap_or("error");
//!     Ok(CommandOutput::new(format!("log level set to {level}"), "PUT /mgmt/config/default/LogTarget"))
//! }
//!
//! let work = tempfile::tempdir()?;
//! let config = BridgeConfig {
//!     staging_root: work.path().join("staging"),
//!     static_root: work.path().join("static"),
//!     history_root: work.path().join("history"),
//!     ..BridgeConfig::default()
//! };
//! let mut catalog = CommandCatalog::new();
//! catalog.register(
//!     CommandRegistration::new("system", "set_log_level")
//!         .category("logging")
//!         .param("appliances", ParamDefault::List(vec![]))
//!         .param("level", ParamDefault::Text("error".into()))
//!         .param("web", ParamDefault::Bool(false))
//!         .handler(set_log_level),
//! )?;
//! let bridge = Bridge::new(catalog, &config);
//! let key = SessionKey::from_cookie("session");
//!
//! let form = bridge.request_form("system", "set_log_level", &[], &[], &key)?;
//! assert_eq!(form.fields.len(), 1);
//!
//! let submission = form.default_submission().with_value("appliances[]", "dp1");
//! let outcome = bridge.submit("system", &submission, &key);
//! assert_eq!(outcome.packaged.display_output, "log level set to error");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`classify`**: the rule table mapping parameters to field kinds
//! - **`form`**: form derivation and the object-option provider seam
//! - **`coerce`**: rebuilding typed arguments from a submission
//! - **`invoke`**: calling commands, absorbing failures, persisting history
//! - **`package`**: staging output files and directories for download
//! - **`render`**: the output fragment renderer seam
//! - **`bridge`**: the facade tying the two paths together

pub mod bridge;
pub mod classify;
pub mod coerce;
pub mod context;
pub mod form;
pub mod invoke;
pub mod package;
pub mod render;

pub use bridge::{Bridge, SubmissionOutcome};
pub use classify::{Classification, FieldClassifier};
pub use coerce::{Coercer, CoercionError};
pub use context::{SubmissionContext, TIMESTAMP_FORMAT};
pub use form::{DomainOptions, FormBuilder, FormContext, OptionsProvider, render_help};
pub use invoke::{Invoker, NO_APPLIANCES_MESSAGE, UNHANDLED_FAILURE_MESSAGE};
pub use package::{Packager, StagingError, archive_name};
pub use render::{HtmlFragmentRenderer, OutputRenderer};
