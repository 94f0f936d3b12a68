//! Agent registry: id → handler.

use std::collections::HashMap;
use std::sync::Arc;

use crate::builtin;
use crate::traits::AgentHandler;

/// Lookup table of agent handlers.
///
/// Built once at start-up and shared behind an `Arc`; lookups never mutate.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    handlers: HashMap<String, Arc<dyn AgentHandler>>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in handler.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for handler in builtin::all() {
            registry.register(handler);
        }
        registry
    }

    /// Register a handler under its id, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn AgentHandler>) {
        let id = handler.id().to_owned();
        if self.handlers.insert(id.clone(), handler).is_some() {
            tracing::debug!(agent = %id, "replaced agent handler");
        }
    }

    /// Look up a handler.
    pub fn get(&self, id: &str) -> Option<Arc<dyn AgentHandler>> {
        self.handlers.get(id).cloned()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}
