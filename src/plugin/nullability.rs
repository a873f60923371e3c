//! Nullability of properties, parameters and responses.
//!
//! The first rule that applies decides:
//!
//! 1. optional types are nullable
//! 2. primitive value types are not
//! 3. a nullable or non-null annotation on the member itself
//! 4. a scope annotation on the declaring class
//! 5. a scope annotation on the declaring package
//! 6. the configured default
//!
//! A nullable member is not required and its schema is marked `nullable`.

use super::{backbone, plugin_config, Plugin, PluginContext};
use crate::error::Result;
use crate::node::{NodePath, SourceEntity};
use crate::type_model::{find_annotation, Annotation, ClassInfo, TypeModel, TypeRef};
use log::trace;
use serde::Deserialize;

pub const NAME: &str = "nullability";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NullabilityConfig {
    /// Nullability of members no rule applies to
    pub default_nullable: bool,
    pub nullable_annotations: Vec<String>,
    pub nonnull_annotations: Vec<String>,
    /// Class or package annotations making members nullable by default
    pub nullable_scope: Vec<String>,
    /// Class or package annotations making members non-null by default
    pub nonnull_scope: Vec<String>,
}

impl Default for NullabilityConfig {
    fn default() -> Self {
        let names = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            default_nullable: false,
            nullable_annotations: names(&["Nullable", "CheckForNull"]),
            nonnull_annotations: names(&["Nonnull", "NonNull", "NotNull"]),
            nullable_scope: names(&["NullableApi"]),
            nonnull_scope: names(&["NonNullApi", "NullMarked"]),
        }
    }
}

#[derive(Default)]
pub struct NullabilityPlugin {
    config: NullabilityConfig,
}

impl NullabilityPlugin {
    pub fn new(config: NullabilityConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &serde_yaml::Value) -> Result<Self> {
        Ok(Self::new(plugin_config(NAME, config)?))
    }

    /// Nullability stated by a set of annotations, if any
    fn polarity(&self, annotations: &[Annotation], nullable: &[String], nonnull: &[String]) -> Option<bool> {
        if find_annotation(annotations, nullable).is_some() {
            Some(true)
        } else if find_annotation(annotations, nonnull).is_some() {
            Some(false)
        } else {
            None
        }
    }

    pub fn is_nullable(
        &self,
        types: TypeModel,
        ty: &TypeRef,
        annotations: &[Annotation],
        declared_in: Option<&ClassInfo>,
    ) -> bool {
        if ty.is_optional() {
            return true;
        }
        if ty.is_value_type() {
            return false;
        }

        let config = &self.config;
        let member = self.polarity(annotations, &config.nullable_annotations, &config.nonnull_annotations);
        let class = declared_in
            .and_then(|class| self.polarity(&class.annotations, &config.nullable_scope, &config.nonnull_scope));
        let package = declared_in.and_then(|class| {
            self.polarity(
                types.package_annotations(class.package()),
                &config.nullable_scope,
                &config.nonnull_scope,
            )
        });

        member.or(class).or(package).unwrap_or(config.default_nullable)
    }
}

impl Plugin for NullabilityPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn order(&self) -> i32 {
        -80
    }

    fn required_plugins(&self) -> Vec<&'static str> {
        vec![backbone::NAME]
    }

    fn exit(&self, path: &NodePath, ctx: &mut PluginContext) -> Result<()> {
        let id = ctx.current_id(path)?;
        let types = ctx.types;

        match ctx.graph.source(id) {
            SourceEntity::Property {
                declared_in, field, ..
            } => {
                let nullable = self.is_nullable(types, &field.ty, &field.annotations, types.class(declared_in));
                trace!("{} nullable: {}", field.name, nullable);
                if let Some(property) = ctx.graph.require_target_mut(id)?.property_mut() {
                    property.required = !nullable;
                    if nullable {
                        property.schema.mark_nullable();
                    }
                }
            }
            SourceEntity::Parameter {
                declared_in,
                parameter,
                ..
            } => {
                let nullable = self.is_nullable(
                    types,
                    &parameter.ty,
                    &parameter.annotations,
                    types.class(declared_in),
                );
                if let Some(property) = ctx.graph.require_target_mut(id)?.property_mut() {
                    property.required = !nullable;
                    if nullable {
                        property.schema.mark_nullable();
                    }
                }
            }
            SourceEntity::Method {
                declared_in, method, ..
            } => {
                if method.return_type.is_void() {
                    return Ok(());
                }
                let nullable = self.is_nullable(
                    types,
                    &method.return_type,
                    &method.annotations,
                    types.class(declared_in),
                );
                if !nullable {
                    return Ok(());
                }
                if let Some(operation) = ctx.graph.require_target_mut(id)?.operation_mut() {
                    if let Some(response) = operation.response.as_mut() {
                        response.mark_nullable();
                    }
                }
            }
            // optionals nested in containers
            SourceEntity::TypeUse { ty, .. } if ty.is_optional() => {
                if let Some(schema) = ctx.graph.require_target_mut(id)?.schema_mut() {
                    schema.mark_nullable();
                }
            }
            _ => {}
        }
        Ok(())
    }
}
