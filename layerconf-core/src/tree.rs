use serde_json::Value;

/// Read-only view of the host-provided configuration tree, addressed by
/// dotted path. Injected at resolver construction so tests can substitute a
/// fake tree.
pub trait GlobalTree: Send + Sync {
    fn lookup(&self, path: &str) -> Option<Value>;
}

impl GlobalTree for Value {
    fn lookup(&self, path: &str) -> Option<Value> {
        let mut cursor = self;
        for segment in path.split('.').filter(|segment| !segment.is_empty()) {
            cursor = cursor.as_object()?.get(segment)?;
        }
        Some(cursor.clone())
    }
}

/// Tree with no values; stands in when the host provides nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyTree;

impl GlobalTree for EmptyTree {
    fn lookup(&self, _path: &str) -> Option<Value> {
        None
    }
}
