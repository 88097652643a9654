//! Field classification: the rule table mapping a parameter's name and
//! default value to the input it is presented as.
//!
//! Rules are evaluated top to bottom and the first match wins:
//!
//! | default   | name                                   | kind                          |
//! |-----------|----------------------------------------|-------------------------------|
//! | bool      | `web`                                  | skipped                       |
//! | bool      | any                                    | checkbox                      |
//! | list      | `appliances`, `credentials`            | skipped                       |
//! | list      | object class, `ObjectClass`            | multi select (object classes) |
//! | list      | `StatusProvider`                       | multi select (providers)      |
//! | list      | any                                    | multi value                   |
//! | string    | `out_dir`, `out_file`                  | skipped                       |
//! | string    | object class, `ObjectClass`            | select (object classes)       |
//! | string    | `StatusProvider`                       | select (providers)            |
//! | string    | contains `password`                    | password                      |
//! | string    | any                                    | text (default)                |
//! | numeric   | any                                    | text (stringified default)    |
//! | absent    | `out_file`                             | skipped                       |
//! | absent    | `file_in`                              | file upload                   |
//! | absent    | any                                    | text (empty)                  |
//! | other     | any                                    | text (empty)                  |

use std::sync::Arc;

use cmdbridge_registry::DomainSets;
use cmdbridge_types::{FieldKind, InitialValue, OptionSet, ParamDefault, Parameter};

/// Internal display-mode flag; always forced on for bridge invocations.
pub const WEB_FLAG: &str = "web";
/// Appliances selected in the session.
pub const APPLIANCES: &str = "appliances";
/// Session credentials, one `username:password` per appliance.
pub const CREDENTIALS: &str = "credentials";
/// Output directory computed per submission.
pub const OUT_DIR: &str = "out_dir";
/// Output file computed per submission.
pub const OUT_FILE: &str = "out_file";
/// Uploaded file content.
pub const FILE_IN: &str = "file_in";
pub const STATUS_PROVIDER: &str = "StatusProvider";
pub const OBJECT_CLASS: &str = "ObjectClass";

/// Kind and initial value derived for one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: FieldKind,
    pub initial: InitialValue,
}

impl Classification {
    fn new(kind: FieldKind, initial: InitialValue) -> Self {
        Self { kind, initial }
    }

    fn skipped() -> Self {
        Self::new(FieldKind::Skipped, InitialValue::Empty)
    }

    fn text(initial: impl Into<String>) -> Self {
        Self::new(FieldKind::Text, InitialValue::Text(initial.into()))
    }

    fn empty_text() -> Self {
        Self::new(FieldKind::Text, InitialValue::Empty)
    }
}

/// Classifies parameters against injected domain sets.
#[derive(Debug, Clone)]
pub struct FieldClassifier {
    domains: Arc<DomainSets>,
}

impl FieldClassifier {
    pub fn new(domains: DomainSets) -> Self {
        Self {
            domains: Arc::new(domains),
        }
    }

    pub fn classify_parameter(&self, parameter: &Parameter) -> Classification {
        self.classify(&parameter.name, &parameter.default)
    }

    /// Classifies one `(name, default)` pair. Never fails; unrecognised
    /// defaults become empty text inputs.
    pub fn classify(&self, name: &str, default: &ParamDefault) -> Classification {
        match default {
            ParamDefault::Bool(_) if name == WEB_FLAG => Classification::skipped(),
            ParamDefault::Bool(checked) => Classification::new(FieldKind::Boolean, InitialValue::Checked(*checked)),

            ParamDefault::List(_) if name == APPLIANCES || name == CREDENTIALS => Classification::skipped(),
            ParamDefault::List(items) => {
                let kind = match self.select_domain(name) {
                    Some(options) => FieldKind::MultiSelect { options },
                    None => FieldKind::MultiValue,
                };
                Classification::new(kind, InitialValue::List(items.clone()))
            }

            ParamDefault::Text(_) if name == OUT_DIR || name == OUT_FILE => Classification::skipped(),
            ParamDefault::Text(text) => {
                let kind = match self.select_domain(name) {
                    Some(options) => FieldKind::SingleSelect { options },
                    None if name.contains("password") => FieldKind::Password,
                    None => FieldKind::Text,
                };
                Classification::new(kind, InitialValue::Text(text.clone()))
            }

            ParamDefault::Integer(number) => Classification::text(number.to_string()),
            ParamDefault::Float(number) => Classification::text(number.to_string()),

            ParamDefault::Absent if name == OUT_FILE => Classification::skipped(),
            ParamDefault::Absent if name == FILE_IN => Classification::new(FieldKind::FileUpload, InitialValue::Empty),
            ParamDefault::Absent | ParamDefault::Opaque(_) => Classification::empty_text(),
        }
    }

    /// Whether `name` selects from the object classes by membership.
    pub fn is_object_class(&self, name: &str) -> bool {
        self.domains.is_object_class(name)
    }

    fn select_domain(&self, name: &str) -> Option<OptionSet> {
        if self.domains.is_object_class(name) {
            Some(Arc::clone(self.domains.object_classes()))
        } else if name == STATUS_PROVIDER {
            Some(Arc::clone(self.domains.status_providers()))
        } else if name == OBJECT_CLASS {
            Some(Arc::clone(self.domains.object_classes()))
        } else {
            None
        }
    }
}

impl Default for FieldClassifier {
    fn default() -> Self {
        Self::new(DomainSets::embedded())
    }
}
