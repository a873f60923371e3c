//! Polymorphic entities.
//!
//! A class declaring its subtypes (`JsonSubTypes` next to `JsonTypeInfo`) is
//! replaced by the union of those subtypes: its component schema becomes a
//! `oneOf` over the subtype references with a discriminator mapping, and every
//! subtype schema gets the discriminator property as a single-value string enum.

use super::{backbone, plugin_config, Dependencies, Plugin, PluginContext};
use crate::error::{Error, Result};
use crate::node::{component_name, NodeDraft, NodePath, SourceEntity, UnionVariant};
use crate::openapi::{Discriminator, Schema, COMPONENTS_PREFIX};
use crate::type_model::{AnnotationValue, ClassInfo};
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

pub const NAME: &str = "subtypes";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubtypesConfig {
    /// Annotations naming the discriminator property
    pub type_info_annotations: Vec<String>,
    /// Annotations listing the subtypes
    pub subtypes_annotations: Vec<String>,
    /// Annotations on a subtype giving its discriminator value
    pub type_name_annotations: Vec<String>,
    /// Discriminator property used when none is declared
    pub default_property: String,
}

impl Default for SubtypesConfig {
    fn default() -> Self {
        Self {
            type_info_annotations: vec!["JsonTypeInfo".to_string()],
            subtypes_annotations: vec!["JsonSubTypes".to_string()],
            type_name_annotations: vec!["JsonTypeName".to_string()],
            default_property: "@type".to_string(),
        }
    }
}

/// The subtypes a base class declares
#[derive(Debug, Clone, PartialEq)]
struct Declaration {
    property: String,
    variants: Vec<UnionVariant>,
}

/// Declarations by base class name; `None` for classes without subtypes
type DeclarationCache = HashMap<String, Option<Declaration>>;

#[derive(Default)]
pub struct SubtypesPlugin {
    config: SubtypesConfig,
}

impl SubtypesPlugin {
    pub fn new(config: SubtypesConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &serde_yaml::Value) -> Result<Self> {
        Ok(Self::new(plugin_config(NAME, config)?))
    }

    fn declaration(&self, class: &ClassInfo, ctx: &mut PluginContext) -> Result<Option<Declaration>> {
        let cache = ctx.storage.plugin_state(NAME, DeclarationCache::new)?;
        if let Some(cached) = cache.get(&class.name) {
            return Ok(cached.clone());
        }

        let declaration = self.read_declaration(class, ctx)?;
        ctx.storage
            .plugin_state(NAME, DeclarationCache::new)?
            .insert(class.name.clone(), declaration.clone());
        Ok(declaration)
    }

    fn read_declaration(&self, class: &ClassInfo, ctx: &PluginContext) -> Result<Option<Declaration>> {
        let Some(subtypes) = class.annotation(&self.config.subtypes_annotations) else {
            return Ok(None);
        };
        let property = class
            .annotation(&self.config.type_info_annotations)
            .and_then(|a| a.get("property"))
            .and_then(|v| v.as_str())
            .unwrap_or(&self.config.default_property)
            .to_string();
        let listed = subtypes.get("value").ok_or_else(|| Error::MissingRequiredField {
            entity: class.name.clone(),
            field: format!("{}.value", subtypes.simple_name()),
        })?;

        let mut variants = Vec::new();
        for item in listed.as_list() {
            let (subtype, name) = match item {
                AnnotationValue::Nested(entry) => {
                    let subtype = entry.get("value").and_then(|v| v.as_str()).ok_or_else(|| {
                        Error::MissingRequiredField {
                            entity: class.name.clone(),
                            field: format!("{}.value", entry.simple_name()),
                        }
                    })?;
                    (subtype, entry.get("name").and_then(|v| v.as_str()))
                }
                AnnotationValue::Text(subtype) => (subtype.as_str(), None),
                other => {
                    return Err(Error::InvalidAnnotationValue {
                        entity: class.name.clone(),
                        annotation: subtypes.simple_name().to_string(),
                        message: format!("`{}` does not name a subtype", other),
                    })
                }
            };

            let subclass = ctx
                .types
                .lookup(subtype)
                .ok_or_else(|| Error::UnknownType(subtype.to_string()))?;
            let name = name
                .or_else(|| {
                    subclass
                        .annotation(&self.config.type_name_annotations)
                        .and_then(|a| a.get("value"))
                        .and_then(|v| v.as_str())
                })
                .unwrap_or_else(|| subclass.simple_name());
            variants.push(UnionVariant {
                name: name.to_string(),
                class: subclass.name.clone(),
            });
        }

        debug!("{} declares {} subtypes", class.name, variants.len());
        Ok(Some(Declaration { property, variants }))
    }
}

impl Plugin for SubtypesPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn order(&self) -> i32 {
        -90
    }

    fn required_plugins(&self) -> Vec<&'static str> {
        vec![backbone::NAME]
    }

    fn resolve(&self, draft: NodeDraft, _path: &NodePath, ctx: &mut PluginContext) -> Result<NodeDraft> {
        let SourceEntity::Entity { class, .. } = &draft.source else {
            return Ok(draft);
        };
        let Some(info) = ctx.types.class(class) else {
            return Ok(draft);
        };
        match self.declaration(info, ctx)? {
            Some(declaration) => Ok(NodeDraft::new(SourceEntity::Union {
                base: info.name.clone(),
                property: declaration.property,
                variants: declaration.variants,
            })),
            None => Ok(draft),
        }
    }

    fn enter(&self, path: &NodePath, ctx: &mut PluginContext) -> Result<()> {
        let id = ctx.current_id(path)?;
        let SourceEntity::Union {
            property, variants, ..
        } = ctx.graph.source(id)
        else {
            return Ok(());
        };

        let one_of = variants
            .iter()
            .map(|v| Schema::reference(&component_name(&v.class, &[])))
            .collect();
        let mapping: BTreeMap<String, String> = variants
            .iter()
            .map(|v| {
                (
                    v.name.clone(),
                    format!("{}{}", COMPONENTS_PREFIX, component_name(&v.class, &[])),
                )
            })
            .collect();
        let union = Schema {
            one_of: Some(one_of),
            discriminator: Some(Discriminator {
                property_name: property.clone(),
                mapping,
            }),
            ..Schema::default()
        };

        if let Some(schema) = ctx.graph.require_target_mut(id)?.schema_mut() {
            schema.merge(union);
        }
        Ok(())
    }

    fn scan(&self, path: &NodePath, deps: &mut Dependencies, ctx: &mut PluginContext) -> Result<()> {
        let id = ctx.current_id(path)?;
        if let SourceEntity::Union { variants, .. } = ctx.graph.source(id) {
            for variant in variants {
                deps.add_root(SourceEntity::Entity {
                    class: variant.class.clone(),
                    args: Vec::new(),
                });
            }
        }
        Ok(())
    }

    fn exit(&self, path: &NodePath, ctx: &mut PluginContext) -> Result<()> {
        let id = ctx.current_id(path)?;
        let SourceEntity::Entity { class, args } = ctx.graph.source(id).clone() else {
            return Ok(());
        };
        let Some(info) = ctx.types.class(&class) else {
            return Ok(());
        };

        // the nearest supertype declaring this class as a subtype
        let mut found = None;
        for bound in ctx.types.supertype_chain(info, &args).iter().skip(1) {
            if let Some(declaration) = self.declaration(bound.class, ctx)? {
                if let Some(variant) = declaration.variants.iter().find(|v| v.class == info.name) {
                    found = Some((declaration.property.clone(), variant.name.clone()));
                    break;
                }
            }
        }
        let Some((property, name)) = found else {
            return Ok(());
        };

        if let Some(schema) = ctx.graph.require_target_mut(id)?.schema_mut() {
            let mut properties = IndexMap::new();
            properties.insert(property.clone(), Schema::string_enum(vec![name]));
            for (existing, value) in schema.properties.take().unwrap_or_default() {
                match properties.get_mut(&existing) {
                    Some(discriminator) => discriminator.merge(value),
                    None => {
                        properties.insert(existing, value);
                    }
                }
            }
            schema.properties = Some(properties);
            schema.add_required(&property);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use crate::graph::Graph;
    use crate::openapi::{Info, OpenApiDocument};
    use crate::storage::SharedStorage;
    use crate::type_model::{Annotation, ClassKind, ClassRegistry, TypeModel};
    use pretty_assertions::assert_eq;

    fn animals() -> ClassRegistry {
        let mut registry = ClassRegistry::new();
        let mut animal = ClassInfo::new("com.example.Animal", ClassKind::Class);
        animal
            .annotations
            .push(Annotation::new("JsonTypeInfo").with("property", "kind"));
        animal.annotations.push(Annotation::new("JsonSubTypes").with(
            "value",
            AnnotationValue::List(vec![
                Annotation::new("Type").with("value", "com.example.Dog").with("name", "dog").into(),
                Annotation::new("Type").with("value", "com.example.Cat").into(),
            ]),
        ));
        registry.insert(animal);

        let mut dog = ClassInfo::new("com.example.Dog", ClassKind::Class);
        dog.superclass = Some(crate::type_model::TypeRef::class("com.example.Animal"));
        registry.insert(dog);

        let mut cat = ClassInfo::new("com.example.Cat", ClassKind::Class);
        cat.superclass = Some(crate::type_model::TypeRef::class("com.example.Animal"));
        cat.annotations.push(Annotation::new("JsonTypeName").with("value", "kitty"));
        registry.insert(cat);
        registry
    }

    #[test]
    fn test_reads_declared_subtypes() {
        let registry = animals();
        let config = ParserConfig::default();
        let mut graph = Graph::new();
        let mut storage = SharedStorage::new(OpenApiDocument::new(Info::default()));
        let mut ctx = PluginContext {
            types: TypeModel::new(&registry),
            graph: &mut graph,
            storage: &mut storage,
            config: &config,
        };

        let plugin = SubtypesPlugin::default();
        let animal = ctx.types.require_class("com.example.Animal").unwrap();
        let declaration = plugin.declaration(animal, &mut ctx).unwrap().unwrap();
        assert_eq!(declaration.property, "kind");
        let names: Vec<&str> = declaration.variants.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["dog", "kitty"]);

        let dog = ctx.types.require_class("com.example.Dog").unwrap();
        assert_eq!(plugin.declaration(dog, &mut ctx).unwrap(), None);
    }

    #[test]
    fn test_missing_subtype_list() {
        let mut registry = ClassRegistry::new();
        let mut shape = ClassInfo::new("com.example.Shape", ClassKind::Class);
        shape.annotations.push(Annotation::new("JsonSubTypes"));
        registry.insert(shape);

        let config = ParserConfig::default();
        let mut graph = Graph::new();
        let mut storage = SharedStorage::new(OpenApiDocument::new(Info::default()));
        let ctx = PluginContext {
            types: TypeModel::new(&registry),
            graph: &mut graph,
            storage: &mut storage,
            config: &config,
        };

        let plugin = SubtypesPlugin::default();
        let shape = ctx.types.require_class("com.example.Shape").unwrap();
        assert!(matches!(
            plugin.read_declaration(shape, &ctx),
            Err(Error::MissingRequiredField { .. })
        ));
    }
}
