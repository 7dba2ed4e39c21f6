use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parser supplied by a [`ConfigEntry::Custom`] entry. Errors it raises are
/// surfaced to callers without any wrapping.
pub type CustomParser = Arc<dyn Fn(&Value) -> anyhow::Result<ConfigValue> + Send + Sync>;

pub type ValueProducer = Arc<dyn Fn() -> ConfigValue + Send + Sync>;

/// A resolved, typed configuration value.
///
/// `Json` carries the structured values produced by custom entries;
/// equality on it is deep.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    String(String),
    Number(f64),
    Bool(bool),
    Json(Value),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The raw JSON shape of this value, as the parser would accept it.
    pub fn to_raw(&self) -> Value {
        match self {
            Self::String(value) => Value::String(value.clone()),
            Self::Number(value) => serde_json::Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Bool(value) => Value::Bool(*value),
            Self::Json(value) => value.clone(),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => f.write_str(value),
            Self::Number(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Json(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Default for a schema entry: either a fixed value or a zero-argument
/// producer re-invoked on every resolution.
#[derive(Clone)]
pub enum DefaultValue {
    Static(ConfigValue),
    Producer(ValueProducer),
}

impl DefaultValue {
    pub fn resolve(&self) -> ConfigValue {
        match self {
            Self::Static(value) => value.clone(),
            Self::Producer(producer) => producer.as_ref()(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Schema declaration for one config key. Matched exhaustively everywhere a
/// variant matters, so adding a kind is a compile error until every site
/// handles it.
#[derive(Clone)]
pub enum ConfigEntry {
    String {
        default: Option<DefaultValue>,
    },
    StringEnum {
        members: Vec<String>,
        default: Option<DefaultValue>,
    },
    Number {
        min: Option<f64>,
        max: Option<f64>,
        default: Option<DefaultValue>,
    },
    Boolean {
        default: Option<DefaultValue>,
    },
    Custom {
        parser: CustomParser,
        default: Option<DefaultValue>,
    },
}

impl ConfigEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::String { .. } => EntryKind::String,
            Self::StringEnum { .. } => EntryKind::StringEnum,
            Self::Number { .. } => EntryKind::Number,
            Self::Boolean { .. } => EntryKind::Boolean,
            Self::Custom { .. } => EntryKind::Custom,
        }
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        match self {
            Self::String { default }
            | Self::StringEnum { default, .. }
            | Self::Number { default, .. }
            | Self::Boolean { default }
            | Self::Custom { default, .. } => default.as_ref(),
        }
    }

    /// Resolves the entry's default, invoking a producer default each call.
    pub fn default_value(&self) -> Option<ConfigValue> {
        self.default().map(DefaultValue::resolve)
    }
}

impl fmt::Debug for ConfigEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String { default } => {
                f.debug_struct("String").field("default", default).finish()
            }
            Self::StringEnum { members, default } => f
                .debug_struct("StringEnum")
                .field("members", members)
                .field("default", default)
                .finish(),
            Self::Number { min, max, default } => f
                .debug_struct("Number")
                .field("min", min)
                .field("max", max)
                .field("default", default)
                .finish(),
            Self::Boolean { default } => {
                f.debug_struct("Boolean").field("default", default).finish()
            }
            Self::Custom { default, .. } => {
                f.debug_struct("Custom").field("default", default).finish()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    String,
    StringEnum,
    Number,
    Boolean,
    Custom,
}

impl EntryKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::StringEnum => "string_enum",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Custom => "custom",
        }
    }
}

/// Immutable mapping from config key to entry, in key order.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entries: BTreeMap<String, ConfigEntry>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, entry: ConfigEntry) -> Self {
        self.entries.insert(key.into(), entry);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ConfigEntry> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ConfigEntry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigEntry, ConfigValue, DefaultValue, EntryKind, Schema};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn producer_default_is_reevaluated_each_resolution() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let entry = ConfigEntry::Number {
            min: None,
            max: None,
            default: Some(DefaultValue::Producer(Arc::new(move || {
                ConfigValue::Number(counter.fetch_add(1, Ordering::SeqCst) as f64)
            }))),
        };

        assert_eq!(entry.default_value(), Some(ConfigValue::Number(0.0)));
        assert_eq!(entry.default_value(), Some(ConfigValue::Number(1.0)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn schema_iterates_in_key_order() {
        let schema = Schema::new()
            .with("zeta", ConfigEntry::String { default: None })
            .with("alpha", ConfigEntry::Boolean { default: None });

        let keys: Vec<&str> = schema.keys().collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
        assert_eq!(schema.get("alpha").map(ConfigEntry::kind), Some(EntryKind::Boolean));
    }

    #[test]
    fn json_values_compare_deeply() {
        let left = ConfigValue::Json(serde_json::json!({"a": [1, 2], "b": {"c": true}}));
        let right = ConfigValue::Json(serde_json::json!({"b": {"c": true}, "a": [1, 2]}));
        assert_eq!(left, right);
    }
}
