//! Methods inherited from exposed supertypes.
//!
//! A supertype of an endpoint that carries one of the exposed annotations
//! contributes its public methods to the endpoint, with the supertype's type
//! parameters bound to the arguments given along the inheritance chain. The
//! plugin also records the access-control annotations that apply to every
//! operation, without interpreting them.

use super::{backbone, plugin_config, Dependencies, Plugin, PluginContext};
use crate::error::Result;
use crate::node::{NodePath, SourceEntity};
use crate::type_model::Annotation;
use log::debug;
use serde::Deserialize;

pub const NAME: &str = "exposed-base";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExposedConfig {
    /// Annotations copied into `x-access-control`
    pub access_annotations: Vec<String>,
}

impl Default for ExposedConfig {
    fn default() -> Self {
        Self {
            access_annotations: ["PermitAll", "DenyAll", "RolesAllowed", "AnonymousAllowed"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Default)]
pub struct ExposedBasePlugin {
    config: ExposedConfig,
}

impl ExposedBasePlugin {
    pub fn new(config: ExposedConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &serde_yaml::Value) -> Result<Self> {
        Ok(Self::new(plugin_config(NAME, config)?))
    }

    fn access_of<'a>(&'a self, annotations: &'a [Annotation]) -> impl Iterator<Item = String> + 'a {
        annotations
            .iter()
            .filter(|a| a.is_any(&self.config.access_annotations))
            .map(|a| a.to_string())
    }
}

impl Plugin for ExposedBasePlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn order(&self) -> i32 {
        -95
    }

    fn required_plugins(&self) -> Vec<&'static str> {
        vec![backbone::NAME]
    }

    fn enter(&self, path: &NodePath, ctx: &mut PluginContext) -> Result<()> {
        let id = ctx.current_id(path)?;
        let SourceEntity::Method {
            endpoint,
            declared_in,
            method,
        } = ctx.graph.source(id)
        else {
            return Ok(());
        };

        // method first, then the declaring class, then the endpoint class
        let mut access: Vec<String> = self.access_of(&method.annotations).collect();
        if let Some(class) = ctx.types.class(declared_in) {
            access.extend(self.access_of(&class.annotations));
        }
        if endpoint != declared_in {
            if let Some(class) = ctx.types.class(endpoint) {
                access.extend(self.access_of(&class.annotations));
            }
        }
        if access.is_empty() {
            return Ok(());
        }

        if let Some(operation) = ctx.graph.require_target_mut(id)?.operation_mut() {
            for entry in access {
                if !operation.operation.access_control.contains(&entry) {
                    operation.operation.access_control.push(entry);
                }
            }
        }
        Ok(())
    }

    fn scan(&self, path: &NodePath, deps: &mut Dependencies, ctx: &mut PluginContext) -> Result<()> {
        let id = ctx.current_id(path)?;
        let SourceEntity::Endpoint { class } = ctx.graph.source(id) else {
            return Ok(());
        };
        let endpoint = ctx.types.require_class(class)?;

        for bound in ctx.types.supertype_chain(endpoint, &[]).iter().skip(1) {
            if !bound.class.has_annotation(&ctx.config.exposed_annotations) {
                continue;
            }
            debug!("Exposing methods of {} on {}", bound.class.name, endpoint.name);
            for method in bound.class.methods.iter().filter(|m| m.is_public && !m.is_static) {
                deps.add_child(SourceEntity::Method {
                    endpoint: endpoint.name.clone(),
                    declared_in: bound.class.name.clone(),
                    method: bound.resolve_method(method),
                });
            }
        }
        Ok(())
    }
}
