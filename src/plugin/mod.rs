//! The plugin contract.
//!
//! Every node passes through the same phases, and in each phase the plugins run
//! in registry order:
//!
//! 1. `resolve` - may replace the draft (source entity and fragment) before the node exists
//! 2. `enter` - the node exists; plugins shape its fragment
//! 3. `scan` - plugins contribute children and root-level dependencies
//! 4. `exit` - all children are attached; last chance to refine the fragment
//!
//! Plugins cooperate only through the graph and the run's [`SharedStorage`].

pub mod backbone;
pub mod exposed;
pub mod nullability;
pub mod registry;
pub mod subtypes;
pub mod transfer_types;
pub mod validation;

pub use registry::PluginRegistry;

use crate::config::{ParserConfig, PluginEntry};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::node::{EntityId, Node, NodeDraft, NodeId, NodePath, SourceEntity};
use crate::storage::SharedStorage;
use crate::type_model::TypeModel;
use serde::de::DeserializeOwned;
use std::collections::HashSet;

/// Names of the built-in plugins, in their default order
pub const BUILTIN_PLUGINS: &[&str] = &[
    transfer_types::NAME,
    backbone::NAME,
    exposed::NAME,
    subtypes::NAME,
    nullability::NAME,
    validation::NAME,
];

pub trait Plugin: Send + Sync {
    /// Unique plugin name
    fn name(&self) -> &'static str;

    /// Plugins run in ascending order within each phase
    fn order(&self) -> i32 {
        0
    }

    /// Plugins that must run before this one, whatever their order
    fn required_plugins(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn resolve(&self, draft: NodeDraft, _path: &NodePath, _ctx: &mut PluginContext) -> Result<NodeDraft> {
        Ok(draft)
    }

    fn enter(&self, _path: &NodePath, _ctx: &mut PluginContext) -> Result<()> {
        Ok(())
    }

    fn scan(&self, _path: &NodePath, _deps: &mut Dependencies, _ctx: &mut PluginContext) -> Result<()> {
        Ok(())
    }

    fn exit(&self, _path: &NodePath, _ctx: &mut PluginContext) -> Result<()> {
        Ok(())
    }
}

/// What a plugin hook may see and touch
pub struct PluginContext<'a> {
    pub types: TypeModel<'a>,
    pub graph: &'a mut Graph,
    pub storage: &'a mut SharedStorage,
    pub config: &'a ParserConfig,
}

impl PluginContext<'_> {
    /// The node at the end of `path`
    pub fn current<'p>(&'p self, path: &NodePath) -> Result<&'p Node> {
        let id = path
            .current()
            .ok_or_else(|| Error::Configuration("hook called with an empty node path".to_string()))?;
        Ok(self.graph.node(id))
    }

    pub fn current_id(&self, path: &NodePath) -> Result<NodeId> {
        path.current()
            .ok_or_else(|| Error::Configuration("hook called with an empty node path".to_string()))
    }
}

/// A dependency that becomes its own root-level node
#[derive(Debug, Clone)]
pub struct RootDependency {
    pub source: SourceEntity,
    /// Whether the engine writes a named reference to it into the current fragment
    pub reference: bool,
}

/// The dependencies contributed by all plugins for one node
#[derive(Debug, Default)]
pub struct Dependencies {
    children: Vec<SourceEntity>,
    roots: Vec<RootDependency>,
    seen: HashSet<EntityId>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// A child nested into the current fragment; duplicates are ignored
    pub fn add_child(&mut self, source: SourceEntity) {
        if self.seen.insert(source.identity()) {
            self.children.push(source);
        }
    }

    /// A root-level entity the current fragment refers to by name
    pub fn add_reference(&mut self, source: SourceEntity) {
        self.roots.push(RootDependency {
            source,
            reference: true,
        });
    }

    /// A root-level entity; the plugin builds any references itself
    pub fn add_root(&mut self, source: SourceEntity) {
        self.roots.push(RootDependency {
            source,
            reference: false,
        });
    }

    pub fn children(&self) -> &[SourceEntity] {
        &self.children
    }

    pub fn roots(&self) -> &[RootDependency] {
        &self.roots
    }

    pub fn into_parts(self) -> (Vec<SourceEntity>, Vec<RootDependency>) {
        (self.children, self.roots)
    }
}

/// Deserialize a plugin's typed configuration; `null` yields the defaults
pub fn plugin_config<T: DeserializeOwned + Default>(plugin: &str, config: &serde_yaml::Value) -> Result<T> {
    if config.is_null() {
        return Ok(T::default());
    }
    serde_yaml::from_value(config.clone())
        .map_err(|e| Error::Configuration(format!("invalid configuration for plugin `{}`: {}", plugin, e)))
}

/// Create a built-in plugin from its configuration entry
pub fn instantiate(entry: &PluginEntry) -> Result<Box<dyn Plugin>> {
    let plugin: Box<dyn Plugin> = match entry.name.as_str() {
        transfer_types::NAME => Box::new(transfer_types::TransferTypesPlugin::from_config(&entry.config)?),
        backbone::NAME => Box::new(backbone::BackbonePlugin::from_config(&entry.config)?),
        exposed::NAME => Box::new(exposed::ExposedBasePlugin::from_config(&entry.config)?),
        subtypes::NAME => Box::new(subtypes::SubtypesPlugin::from_config(&entry.config)?),
        nullability::NAME => Box::new(nullability::NullabilityPlugin::from_config(&entry.config)?),
        validation::NAME => Box::new(validation::ValidationPlugin::from_config(&entry.config)?),
        other => return Err(Error::Configuration(format!("unknown plugin `{}`", other))),
    };
    Ok(plugin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_model::TypeRef;

    #[test]
    fn test_dependencies_union_children() {
        let mut deps = Dependencies::new();
        let child = SourceEntity::Entity {
            class: "com.example.User".to_string(),
            args: vec![TypeRef::Any],
        };
        deps.add_child(child.clone());
        deps.add_child(child);
        assert_eq!(deps.children().len(), 1);
    }

    #[test]
    fn test_instantiate_builtins() {
        for name in BUILTIN_PLUGINS {
            let plugin = instantiate(&PluginEntry::new(*name)).unwrap();
            assert_eq!(plugin.name(), *name);
        }
        assert!(matches!(
            instantiate(&PluginEntry::new("unknown")),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_plugin_config() {
        let entry = PluginEntry {
            name: nullability::NAME.to_string(),
            config: serde_yaml::from_str("default_nullable: maybe").unwrap(),
        };
        assert!(matches!(instantiate(&entry), Err(Error::Configuration(_))));
    }
}
