use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::parse::parse;
use crate::schema::{ConfigEntry, ConfigValue, Schema};
use crate::store::OverrideStore;
use crate::tree::{EmptyTree, GlobalTree};
use crate::watch::{ChangeBus, ChangeEvent, Subscription};

/// Fully computed, typed configuration snapshot, one value per schema key.
pub type ResolvedConfig = BTreeMap<String, ConfigValue>;

/// Which layer won the resolution of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    Override,
    Global,
    Default,
}

pub struct ResolverOptions {
    pub schema: Schema,
    pub namespace: String,
    pub store: Option<Arc<dyn OverrideStore>>,
    pub tree: Arc<dyn GlobalTree>,
    pub local_override: bool,
}

impl ResolverOptions {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            namespace: String::new(),
            store: None,
            tree: Arc::new(EmptyTree),
            local_override: true,
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn store(mut self, store: Arc<dyn OverrideStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn tree(mut self, tree: Arc<dyn GlobalTree>) -> Self {
        self.tree = tree;
        self
    }

    pub fn local_override(mut self, enabled: bool) -> Self {
        self.local_override = enabled;
        self
    }
}

/// Layered configuration resolver. Per key, precedence is override store,
/// then global tree, then schema default; a key with neither a global value
/// nor a default is required and fails resolution.
pub struct Resolver {
    schema: Schema,
    namespace: String,
    store: Option<Arc<dyn OverrideStore>>,
    tree: Arc<dyn GlobalTree>,
    local_override: bool,
    bus: ChangeBus,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("namespace", &self.namespace)
            .field("local_override", &self.local_override)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// Builds the resolver and eagerly resolves every key, so a missing
    /// required value or a malformed global value surfaces at startup
    /// instead of on first access.
    pub fn new(options: ResolverOptions) -> Result<Self> {
        let resolver = Self {
            schema: options.schema,
            namespace: options.namespace,
            store: options.store,
            tree: options.tree,
            local_override: options.local_override,
            bus: ChangeBus::new(),
        };
        resolver.get_all()?;
        Ok(resolver)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn qualified_key(&self, key: &str) -> String {
        if self.namespace.is_empty() {
            key.to_owned()
        } else {
            format!("{}.{key}", self.namespace)
        }
    }

    fn entry(&self, key: &str) -> Result<&ConfigEntry> {
        self.schema
            .get(key)
            .ok_or_else(|| Error::UnknownKey { key: key.to_owned() })
    }

    fn store(&self) -> Result<&Arc<dyn OverrideStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| Error::Storage("no override store configured".to_owned()))
    }

    /// The raw persisted override string, if any. Store read failures are
    /// treated as absence.
    pub fn raw_storage_value(&self, key: &str) -> Option<String> {
        if !self.local_override {
            return None;
        }
        let store = self.store.as_ref()?;
        match store.get_item(&self.qualified_key(key)) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(key, error = %err, "override store read failed, treating as absent");
                None
            }
        }
    }

    /// The parsed override value for `key`, or `None` when the store is
    /// disabled, the entry is absent, or the stored value is unusable.
    /// Storage corruption never fails resolution.
    pub fn storage_value(&self, key: &str) -> Option<ConfigValue> {
        let entry = self.schema.get(key)?;
        let raw = self.raw_storage_value(key)?;
        // Structured overrides are persisted as JSON text; anything that
        // does not decode is taken as a plain string.
        let decoded = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
        match parse(key, &decoded, entry) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(key, error = %err, "stored override rejected by schema, ignoring");
                None
            }
        }
    }

    /// The parsed global-tree value for `key`. A present-but-invalid value
    /// fails loudly: a misconfigured host is a caller bug.
    pub fn global_value(&self, key: &str) -> Result<Option<ConfigValue>> {
        let entry = self.entry(key)?;
        let Some(raw) = self.tree.lookup(&self.qualified_key(key)) else {
            return Ok(None);
        };
        if raw.is_null() {
            return Ok(None);
        }

        parse(key, &raw, entry)
            .map(Some)
            .map_err(|err| Error::MalformedGlobalValue {
                key: key.to_owned(),
                source: Box::new(err),
            })
    }

    pub fn get(&self, key: &str) -> Result<ConfigValue> {
        self.resolve_with_source(key).map(|(value, _)| value)
    }

    /// Resolves `key` along with the layer that supplied the value.
    pub fn resolve_with_source(&self, key: &str) -> Result<(ConfigValue, ValueSource)> {
        let entry = self.entry(key)?;
        let global = self.global_value(key)?;
        let default = entry.default_value();

        // The key is required even when an override happens to be present.
        let fallback = match (global, default) {
            (Some(value), _) => (value, ValueSource::Global),
            (None, Some(value)) => (value, ValueSource::Default),
            (None, None) => return Err(Error::MissingRequired { key: key.to_owned() }),
        };

        if let Some(value) = self.storage_value(key) {
            return Ok((value, ValueSource::Override));
        }
        Ok(fallback)
    }

    /// Validates and persists an override for `key`. A value equal to the
    /// global value or the default removes the override instead, restoring
    /// fallback precedence. Publishes a change notification either way.
    pub fn set(&self, key: &str, value: ConfigValue) -> Result<()> {
        let entry = self.entry(key)?;
        let store = self.store()?;

        // Custom-entry failures pass through verbatim; built-in entries
        // surface their constraint error. Nothing is written on failure.
        let validated = parse(key, &value.to_raw(), entry)?;

        let global = self.global_value(key)?;
        let default = entry.default_value();
        let qualified = self.qualified_key(key);

        if global.as_ref() == Some(&validated) || default.as_ref() == Some(&validated) {
            store.remove_item(&qualified)?;
        } else {
            let encoded = match &validated {
                ConfigValue::String(value) => value.clone(),
                other => serde_json::to_string(&other.to_raw()).map_err(|err| {
                    Error::Storage(format!("failed to encode override for '{key}': {err}"))
                })?,
            };
            store.set_item(&qualified, &encoded)?;
        }

        self.bus.publish(&ChangeEvent::single(key));
        Ok(())
    }

    /// Removes the override for `key`, if any, and notifies subscribers.
    pub fn unset(&self, key: &str) -> Result<()> {
        self.entry(key)?;
        let store = self.store()?;
        store.remove_item(&self.qualified_key(key))?;
        self.bus.publish(&ChangeEvent::single(key));
        Ok(())
    }

    /// Removes every schema key's override and publishes one bulk event.
    pub fn clear_overrides(&self) -> Result<()> {
        let store = self.store()?;
        for key in self.schema.keys() {
            store.remove_item(&self.qualified_key(key))?;
        }
        self.bus.publish(&ChangeEvent::bulk());
        Ok(())
    }

    /// Resolves every schema key into a snapshot.
    pub fn get_all(&self) -> Result<ResolvedConfig> {
        let mut resolved = ResolvedConfig::new();
        for key in self.schema.keys() {
            resolved.insert(key.to_owned(), self.get(key)?);
        }
        Ok(resolved)
    }

    pub fn subscribe(
        &self,
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.bus.subscribe(callback)
    }
}
