//! Registry crate for the commands exposed through the bridge.
//!
//! This crate holds the command catalog (descriptors plus their callables,
//! indexed by plugin and category), the bridge configuration and the domain
//! sets injected into field classification.

pub mod catalog;
pub mod config;
pub mod domains;

pub use catalog::{CatalogEntry, CatalogError, Command, CommandCatalog, CommandRegistration};
pub use cmdbridge_types::{CommandDescriptor, CommandOutput, ParamDefault, Parameter};
pub use config::{BridgeConfig, ConfigError, default_config_path};
pub use domains::DomainSets;
