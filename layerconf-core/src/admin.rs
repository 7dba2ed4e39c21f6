use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::parse::parse;
use crate::resolver::{Resolver, ValueSource};
use crate::schema::{ConfigValue, EntryKind};
use crate::watch::Subscription;

/// Per-key record driving a configuration-editing UI: provenance of the
/// current value plus pending-edit state.
#[derive(Debug, Clone, Serialize)]
pub struct AdminField {
    pub path: String,
    pub kind: EntryKind,
    pub default_value: Option<ConfigValue>,
    pub global_value: Option<ConfigValue>,
    /// Raw persisted override string, if any.
    pub storage_value: Option<String>,
    /// Effective value, or the staged edit when one is pending.
    pub value: ConfigValue,
    pub source: ValueSource,
    pub is_from_storage: bool,
    pub is_editing: bool,
}

/// Editing session over a [`Resolver`]. Staged edits live only in memory
/// until `submit`; `fields` recomputes the projection on every call.
pub struct AdminSession {
    resolver: Arc<Resolver>,
    edits: Arc<Mutex<BTreeMap<String, ConfigValue>>>,
    generation: Arc<AtomicU64>,
    _subscription: Subscription,
}

impl AdminSession {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        let generation = Arc::new(AtomicU64::new(0));

        // External writes (another session, another process sharing the
        // store) bump the generation so frontends re-pull the fields.
        let subscription = {
            let generation = Arc::clone(&generation);
            resolver.subscribe(move |_event| {
                generation.fetch_add(1, Ordering::SeqCst);
            })
        };

        Self {
            resolver,
            edits: Arc::new(Mutex::new(BTreeMap::new())),
            generation,
            _subscription: subscription,
        }
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    /// Bumped on every change notification; frontends compare it to decide
    /// when to recompute.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// One record per schema key, in key order.
    pub fn fields(&self) -> Result<Vec<AdminField>> {
        let edits = self.edits.lock().unwrap_or_else(PoisonError::into_inner);
        let mut fields = Vec::with_capacity(self.resolver.schema().len());

        for (key, entry) in self.resolver.schema().entries() {
            let (effective, source) = self.resolver.resolve_with_source(key)?;
            let staged = edits.get(key).cloned();
            let value = staged.unwrap_or_else(|| effective.clone());
            let is_editing = value != effective;

            fields.push(AdminField {
                path: key.to_owned(),
                kind: entry.kind(),
                default_value: entry.default_value(),
                global_value: self.resolver.global_value(key)?,
                storage_value: self.resolver.raw_storage_value(key),
                value,
                source,
                is_from_storage: source == ValueSource::Override,
                is_editing,
            });
        }

        Ok(fields)
    }

    /// Stages an edit in memory; nothing is validated or persisted until
    /// `submit`.
    pub fn stage(&self, key: &str, value: ConfigValue) -> Result<()> {
        if self.resolver.schema().get(key).is_none() {
            return Err(Error::UnknownKey { key: key.to_owned() });
        }

        let mut edits = self.edits.lock().unwrap_or_else(PoisonError::into_inner);
        edits.insert(key.to_owned(), value);
        Ok(())
    }

    /// Drops a staged edit without persisting it.
    pub fn discard(&self, key: &str) {
        let mut edits = self.edits.lock().unwrap_or_else(PoisonError::into_inner);
        edits.remove(key);
    }

    /// Persists every staged edit, all-or-nothing: the whole batch is
    /// validated before the first write, and any failure aborts with the
    /// edit buffer intact.
    pub fn submit(&self) -> Result<()> {
        let pending: Vec<(String, ConfigValue)> = {
            let edits = self.edits.lock().unwrap_or_else(PoisonError::into_inner);
            edits
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        };

        for (key, value) in &pending {
            let entry = self
                .resolver
                .schema()
                .get(key)
                .ok_or_else(|| Error::UnknownKey { key: key.clone() })?;
            parse(key, &value.to_raw(), entry)?;
        }

        for (key, value) in pending {
            self.resolver.set(&key, value)?;
        }

        let mut edits = self.edits.lock().unwrap_or_else(PoisonError::into_inner);
        edits.clear();
        Ok(())
    }

    /// Removes every override and clears staged edits, restoring pure
    /// global/default precedence.
    pub fn reset(&self) -> Result<()> {
        self.resolver.clear_overrides()?;
        let mut edits = self.edits.lock().unwrap_or_else(PoisonError::into_inner);
        edits.clear();
        Ok(())
    }
}
