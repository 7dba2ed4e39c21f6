use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Notification published after every successful override mutation.
/// `key` is `None` for a bulk reset. Subscribers must tolerate redundant
/// notifications; recomputing is always cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: Option<String>,
}

impl ChangeEvent {
    pub fn single(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
        }
    }

    pub fn bulk() -> Self {
        Self { key: None }
    }
}

type Callback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<(u64, Callback)>,
}

/// Explicit observer registry replacing an ambient broadcast event.
/// Callbacks run synchronously on the publishing thread; the registry lock
/// is released before any callback runs.
#[derive(Clone, Default)]
pub struct ChangeBus {
    registry: Arc<Mutex<Registry>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: &ChangeEvent) {
        let callbacks: Vec<Callback> = {
            let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry
                .subscribers
                .iter()
                .map(|(_, callback)| Arc::clone(callback))
                .collect()
        };

        for callback in callbacks {
            callback(event);
        }
    }

    pub fn subscribe(
        &self,
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.push((id, Arc::new(callback)));

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.subscribers.len()
    }
}

/// Scoped registration on a [`ChangeBus`]; deregisters on drop, on every
/// exit path.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry.subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}
