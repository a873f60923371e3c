//! Run-scoped state shared by the engine and its plugins.

use crate::error::{Error, Result};
use crate::node::EntityId;
use crate::openapi::OpenApiDocument;
use std::any::Any;
use std::collections::{HashMap, HashSet};

/// One instance per generation run; never shared between runs
pub struct SharedStorage {
    document: OpenApiDocument,
    plugin_state: HashMap<&'static str, Box<dyn Any + Send>>,
    visited: HashSet<EntityId>,
}

impl SharedStorage {
    pub fn new(document: OpenApiDocument) -> Self {
        Self {
            document,
            plugin_state: HashMap::new(),
            visited: HashSet::new(),
        }
    }

    /// The state object of a plugin, created by `factory` on first access.
    ///
    /// Requesting the state of a plugin with a different type than it was
    /// created with is a configuration error.
    pub fn plugin_state<T, F>(&mut self, plugin: &'static str, factory: F) -> Result<&mut T>
    where
        T: Any + Send,
        F: FnOnce() -> T,
    {
        self.plugin_state
            .entry(plugin)
            .or_insert_with(|| Box::new(factory()))
            .downcast_mut::<T>()
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "state of plugin `{}` is not a {}",
                    plugin,
                    std::any::type_name::<T>()
                ))
            })
    }

    /// Record an identity as visited; returns `false` if it already was
    pub fn mark_visited(&mut self, identity: &EntityId) -> bool {
        self.visited.insert(identity.clone())
    }

    pub fn is_visited(&self, identity: &EntityId) -> bool {
        self.visited.contains(identity)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn document(&self) -> &OpenApiDocument {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut OpenApiDocument {
        &mut self.document
    }

    /// End the run and hand out the finished document
    pub fn finish(self) -> OpenApiDocument {
        self.document
    }
}
