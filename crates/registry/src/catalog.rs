use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use cmdbridge_types::{CoercedArguments, CommandDescriptor, CommandOutput, ParamDefault, Parameter};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

/// Errors surfaced by catalog lookups and registration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("command not found: {plugin}:{name}")]
    NotFound { plugin: String, name: String },

    #[error("plugin not found: {plugin}")]
    UnknownPlugin { plugin: String },

    #[error("command already registered: {plugin}:{name}")]
    DuplicateCommand { plugin: String, name: String },

    #[error("parameter declared twice in {plugin}:{name}: {parameter}")]
    DuplicateParameter { plugin: String, name: String, parameter: String },
}

impl CatalogError {
    pub fn not_found(plugin: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            plugin: plugin.into(),
            name: name.into(),
        }
    }
}

/// A callable command.
///
/// Implementations receive exactly the arguments their descriptor declares
/// and report failures through the returned error; they should not panic.
pub trait Command: Send + Sync {
    fn invoke(&self, arguments: &CoercedArguments) -> anyhow::Result<CommandOutput>;
}

impl<F> Command for F
where
    F: Fn(&CoercedArguments) -> anyhow::Result<CommandOutput> + Send + Sync,
{
    fn invoke(&self, arguments: &CoercedArguments) -> anyhow::Result<CommandOutput> {
        self(arguments)
    }
}

/// A resolved command: its descriptor and the callable behind it.
#[derive(Clone)]
pub struct CatalogEntry {
    pub descriptor: Arc<CommandDescriptor>,
    pub command: Arc<dyn Command>,
}

impl fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Declarative registration of one command.
///
/// ```rust
/// use cmdbridge_registry::{CommandCatalog, CommandOutput, CommandRegistration, ParamDefault};
/// use cmdbridge_types::CoercedArguments;
///
/// fn flush_cache(_arguments: &CoercedArguments) -> anyhow::Result<CommandOutput> {
///     Ok(CommandOutput::new("flushed", "POST /mgmt/actionqueue"))
/// }
///
/// let mut catalog = CommandCatalog::new();
/// catalog
///     .register(
///         CommandRegistration::new("system", "flush-cache")
///             .category("caches")
///             .doc("Flush the document cache.")
///             .param("appliances", ParamDefault::List(vec![]))
///             .param("web", ParamDefault::Bool(false))
///             .handler(flush_cache),
///     )
///     .expect("register flush-cache");
///
/// let entry = catalog.resolve("system", "flush-cache").expect("resolve");
/// assert_eq!(entry.descriptor.parameters.len(), 2);
/// ```
pub struct CommandRegistration {
    descriptor: CommandDescriptor,
    command: Option<Arc<dyn Command>>,
}

impl CommandRegistration {
    pub fn new(plugin: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            descriptor: CommandDescriptor {
                plugin: plugin.into(),
                name: name.into(),
                category: String::new(),
                doc: String::new(),
                parameters: Vec::new(),
            },
            command: None,
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.descriptor.category = category.into();
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.descriptor.doc = doc.into();
        self
    }

    /// Appends a parameter; declaration order is preserved.
    pub fn param(mut self, name: impl Into<String>, default: ParamDefault) -> Self {
        self.descriptor.parameters.push(Parameter::new(name, default));
        self
    }

    pub fn handler(mut self, command: impl Command + 'static) -> Self {
        self.command = Some(Arc::new(command));
        self
    }
}

#[derive(Default)]
struct PluginIndex {
    /// Category name to command names, in registration order
    categories: BTreeMap<String, Vec<String>>,
    entries: IndexMap<String, CatalogEntry>,
}

/// Commands known to the bridge, indexed by plugin and category.
#[derive(Default)]
pub struct CommandCatalog {
    plugins: IndexMap<String, PluginIndex>,
}

impl CommandCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command.
    ///
    /// A registration without a handler gets one that reports the command as
    /// not implemented when invoked.
    pub fn register(&mut self, registration: CommandRegistration) -> Result<(), CatalogError> {
        let CommandRegistration { descriptor, command } = registration;

        let mut seen = std::collections::HashSet::new();
        for parameter in &descriptor.parameters {
            if !seen.insert(parameter.name.as_str()) {
                return Err(CatalogError::DuplicateParameter {
                    plugin: descriptor.plugin.clone(),
                    name: descriptor.name.clone(),
                    parameter: parameter.name.clone(),
                });
            }
        }

        let index = self.plugins.entry(descriptor.plugin.clone()).or_default();
        if index.entries.contains_key(&descriptor.name) {
            return Err(CatalogError::DuplicateCommand {
                plugin: descriptor.plugin,
                name: descriptor.name,
            });
        }

        debug!(
            command = %descriptor.canonical_id(),
            category = %descriptor.category,
            parameters = descriptor.parameters.len(),
            "registered command"
        );
        let command = command.unwrap_or_else(|| Arc::new(NotImplemented(descriptor.canonical_id())));
        index
            .categories
            .entry(descriptor.category.clone())
            .or_default()
            .push(descriptor.name.clone());
        index.entries.insert(
            descriptor.name.clone(),
            CatalogEntry {
                descriptor: Arc::new(descriptor),
                command,
            },
        );
        Ok(())
    }

    /// Resolves `(plugin, name)` to a descriptor and its callable.
    ///
    /// Names are matched exactly first; a name using spaces in place of
    /// underscores (as shown on buttons) is accepted as well.
    pub fn resolve(&self, plugin: &str, name: &str) -> Result<CatalogEntry, CatalogError> {
        let index = self.plugins.get(plugin).ok_or_else(|| CatalogError::not_found(plugin, name))?;
        let name = name.trim();
        index
            .entries
            .get(name)
            .or_else(|| index.entries.get(&name.replace(' ', "_")))
            .cloned()
            .ok_or_else(|| CatalogError::not_found(plugin, name))
    }

    /// Command names of `plugin` grouped by category; categories iterate in
    /// sorted order, commands in registration order.
    pub fn list_commands_by_category(&self, plugin: &str) -> Result<BTreeMap<String, Vec<String>>, CatalogError> {
        self.plugins
            .get(plugin)
            .map(|index| index.categories.clone())
            .ok_or_else(|| CatalogError::UnknownPlugin {
                plugin: plugin.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.plugins.values().map(|index| index.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct NotImplemented(String);

impl Command for NotImplemented {
    fn invoke(&self, _arguments: &CoercedArguments) -> anyhow::Result<CommandOutput> {
        anyhow::bail!("command '{}' has no implementation registered", self.0)
    }
}
