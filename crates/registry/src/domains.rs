//! Domain sets consulted by field classification.
//!
//! Two ordered name sets decide which parameters become selects: the
//! manageable object classes (`CryptoCertificate`, `MultiProtocolGateway`,
//! ...) and the queryable status providers (`CPUUsage`, `MemoryStatus`, ...).
//! The defaults ship embedded; configuration may replace either set.

use std::sync::Arc;

use cmdbridge_types::OptionSet;
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use serde::Deserialize;

const EMBEDDED_DOMAINS: &str = include_str!("../data/domains.json");

#[derive(Deserialize)]
struct DomainFile {
    object_classes: Vec<String>,
    status_providers: Vec<String>,
}

static EMBEDDED: Lazy<DomainSets> = Lazy::new(|| {
    let file: DomainFile = serde_json::from_str(EMBEDDED_DOMAINS).expect("embedded domain data is valid JSON");
    DomainSets::new(file.object_classes, file.status_providers)
});

/// The object-class and status-provider name sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSets {
    object_classes: IndexSet<String>,
    status_providers: IndexSet<String>,
    object_class_options: OptionSet,
    status_provider_options: OptionSet,
}

impl DomainSets {
    /// Builds domain sets from ordered name lists; duplicates keep their first position.
    pub fn new<O, S>(object_classes: O, status_providers: S) -> Self
    where
        O: IntoIterator,
        O::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        let object_classes: IndexSet<String> = object_classes.into_iter().map(Into::into).collect();
        let status_providers: IndexSet<String> = status_providers.into_iter().map(Into::into).collect();
        Self {
            object_class_options: Arc::from(object_classes.iter().cloned().collect::<Vec<_>>()),
            status_provider_options: Arc::from(status_providers.iter().cloned().collect::<Vec<_>>()),
            object_classes,
            status_providers,
        }
    }

    /// The appliance-management defaults shipped with the crate.
    pub fn embedded() -> Self {
        EMBEDDED.clone()
    }

    pub fn empty() -> Self {
        Self::new(Vec::<String>::new(), Vec::<String>::new())
    }

    pub fn is_object_class(&self, name: &str) -> bool {
        self.object_classes.contains(name)
    }

    pub fn is_status_provider(&self, name: &str) -> bool {
        self.status_providers.contains(name)
    }

    pub fn object_classes(&self) -> &OptionSet {
        &self.object_class_options
    }

    pub fn status_providers(&self) -> &OptionSet {
        &self.status_provider_options
    }
}

impl Default for DomainSets {
    fn default() -> Self {
        Self::embedded()
    }
}
