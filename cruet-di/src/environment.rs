//! Read-only key-value view of the environment, consumed by registration
//! conditions and value-resolver aware callbacks. Loading configuration from
//! files is the responsibility of external layers - this module only
//! represents already-loaded values.

use fxhash::FxHashMap;

/// Read-only property lookup with `${key}` placeholder substitution.
pub trait Environment: Send + Sync {
    /// Returns the value for the given property key, if present.
    fn get_property(&self, key: &str) -> Option<String>;

    /// Substitutes `${key}` placeholders in the given expression with
    /// property values. Placeholders referencing absent keys are left
    /// verbatim, since environment completeness cannot be guaranteed.
    fn resolve_placeholders(&self, expression: &str) -> String {
        let mut result = String::with_capacity(expression.len());
        let mut rest = expression;

        while let Some(start) = rest.find("${") {
            let (head, tail) = rest.split_at(start);
            result.push_str(head);

            if let Some(end) = tail.find('}') {
                let key = &tail[2..end];
                match self.get_property(key) {
                    Some(value) => result.push_str(&value),
                    None => result.push_str(&tail[..=end]),
                }

                rest = &tail[end + 1..];
            } else {
                rest = tail;
                break;
            }
        }

        result.push_str(rest);
        result
    }
}

/// In-memory [Environment] backed by an explicit property map.
#[derive(Clone, Debug, Default)]
pub struct MapEnvironment {
    properties: FxHashMap<String, String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a property, replacing any previous value for the key.
    pub fn with_property<K: ToString, V: ToString>(mut self, key: K, value: V) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }
}

impl Environment for MapEnvironment {
    fn get_property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }
}

/// [Environment] backed by process environment variables.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn get_property(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}
