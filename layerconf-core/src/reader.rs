use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;
use crate::resolver::{ResolvedConfig, Resolver};
use crate::schema::ConfigValue;
use crate::watch::Subscription;

/// Reactive accessor over a [`Resolver`]: holds the current snapshot and
/// recomputes it on every change notification. Dropping the reader releases
/// its subscription.
pub struct ConfigReader {
    resolver: Arc<Resolver>,
    cache: Arc<Mutex<ResolvedConfig>>,
    generation: Arc<AtomicU64>,
    _subscription: Subscription,
}

impl ConfigReader {
    pub fn new(resolver: Arc<Resolver>) -> Result<Self> {
        let cache = Arc::new(Mutex::new(resolver.get_all()?));
        let generation = Arc::new(AtomicU64::new(0));

        let subscription = {
            let source = Arc::clone(&resolver);
            let cache = Arc::clone(&cache);
            let generation = Arc::clone(&generation);
            resolver.subscribe(move |_event| {
                match source.get_all() {
                    Ok(snapshot) => {
                        *cache.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
                        generation.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "snapshot refresh failed, keeping previous values");
                    }
                }
            })
        };

        Ok(Self {
            resolver,
            cache,
            generation,
            _subscription: subscription,
        })
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn snapshot(&self) -> ResolvedConfig {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bumped on every refresh; frontends compare it to skip redundant
    /// re-renders.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }
}
