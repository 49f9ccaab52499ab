//! Typed capability table
//!
//! Each module exposes a handful of named handles. A handle is any
//! `Arc<T>` (usually `Arc<dyn SomeTrait>`); callers ask for it back by name
//! and type.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// One exposed handle, type-erased.
#[derive(Clone)]
pub struct ExposedItem {
    type_name: &'static str,
    handle: Arc<dyn Any + Send + Sync>,
}

impl ExposedItem {
    fn new<T: ?Sized + Send + Sync + 'static>(handle: Arc<T>) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            handle: Arc::new(handle),
        }
    }

    /// Name of the type the handle was exposed as.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The handle, if it was exposed as `Arc<T>`.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.handle.downcast_ref::<Arc<T>>().cloned()
    }
}

impl std::fmt::Debug for ExposedItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExposedItem").field("type_name", &self.type_name).finish()
    }
}

#[derive(Clone, Debug, Default)]
pub struct CapabilityTable {
    items: HashMap<String, ExposedItem>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose a handle. Replaces any existing handle with the same name.
    pub fn expose<T: ?Sized + Send + Sync + 'static>(&mut self, name: impl Into<String>, handle: Arc<T>) {
        self.items.insert(name.into(), ExposedItem::new(handle));
    }

    pub fn with<T: ?Sized + Send + Sync + 'static>(mut self, name: impl Into<String>, handle: Arc<T>) -> Self {
        self.expose(name, handle);
        self
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.items.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&ExposedItem> {
        self.items.get(name)
    }

    pub fn get_typed<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.items.get(name).and_then(|item| item.downcast::<T>())
    }

    /// Exposed names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.items.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
