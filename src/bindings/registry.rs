//! Mapper registry.
//!
//! Explicit name-to-descriptor table populated at startup. A name may carry
//! several overloads with different signatures; the compiler picks among them.

use super::library;
use super::mapper::MapperDescriptor;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct MapperRegistry {
    mappers: HashMap<String, Vec<Arc<MapperDescriptor>>>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the standard mapper library.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        library::register_standard(&mut registry);
        debug!(
            mappers = registry.mappers.len(),
            overloads = registry.overload_count(),
            "Standard mapper library registered"
        );
        registry
    }

    pub fn register(&mut self, descriptor: MapperDescriptor) -> &mut Self {
        self.mappers
            .entry(descriptor.name.to_string())
            .or_default()
            .push(Arc::new(descriptor));
        self
    }

    /// Overloads for `name`, in registration order.
    pub fn lookup(&self, name: &str) -> &[Arc<MapperDescriptor>] {
        self.mappers.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.mappers.contains_key(name)
    }

    /// Sorted mapper names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.mappers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    pub fn overload_count(&self) -> usize {
        self.mappers.values().map(Vec::len).sum()
    }
}
