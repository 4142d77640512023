//! Masking rules — the redactor contract and the process-wide registry
//!
//! A redactor rewrites the scalar string value at `key` inside its owning
//! object, replacing a window of characters with `*`. The engine never
//! defines rules inline; it looks them up by name in the registry, which
//! is populated once with the built-in catalog and fixed thereafter.

mod rules;

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::{Map, Value};

use crate::error::MaskError;

/// A masking rule: rewrites the string at `key` inside `map` in place.
pub type Redactor = fn(&mut Map<String, Value>, &str) -> Result<(), MaskError>;

/// Name → rule mapping, fixed after construction.
#[derive(Debug, Default)]
pub struct RedactorRegistry {
    rules: HashMap<String, Redactor>,
}

impl RedactorRegistry {
    /// The built-in catalog: `phone`, `name`, `id_card`, `car_number`.
    pub fn builtin() -> Self {
        let mut rules: HashMap<String, Redactor> = HashMap::new();
        rules.insert("phone".into(), rules::phone);
        rules.insert("name".into(), rules::name);
        rules.insert("id_card".into(), rules::id_card);
        rules.insert("car_number".into(), rules::car_number);
        Self { rules }
    }

    /// Look up a rule by name.
    pub fn get(&self, rule: &str) -> Option<Redactor> {
        self.rules.get(rule).copied()
    }

    /// Registered rule names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }
}

static REGISTRY: OnceLock<RedactorRegistry> = OnceLock::new();

/// The process-wide rule registry, initialized with the built-in catalog
/// on first access.
pub fn registry() -> &'static RedactorRegistry {
    REGISTRY.get_or_init(RedactorRegistry::builtin)
}
