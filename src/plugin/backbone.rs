//! Structural shape of the document.
//!
//! Endpoints become tags with one operation per public method, methods become
//! `POST /{Endpoint}/{method}` operations whose request body is an object with
//! one property per parameter, entity classes become object (or string enum)
//! component schemas, and type uses become primitive, array, map or reference
//! schemas. Required flags follow the structural default: everything that is
//! not an optional type is required.

use super::{plugin_config, Dependencies, Plugin, PluginContext};
use crate::error::{Error, Result};
use crate::node::{NodePath, SourceEntity, TargetFragment, TypeSlot};
use crate::openapi::Schema;
use crate::type_model::{find_annotation, generics, Annotation, AnnotationValue, BoundClass, ClassInfo, FieldInfo, TypeRef};
use log::{debug, warn};
use serde::Deserialize;

pub const NAME: &str = "backbone";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackboneConfig {
    /// Field annotations that exclude the field from its schema
    pub ignore_annotations: Vec<String>,
    /// Field annotations whose `value` overrides the property name
    pub property_name_annotations: Vec<String>,
    pub deprecated_annotations: Vec<String>,
    /// Map classes missing from the metadata to a free-form object instead of failing
    pub allow_unknown_types: bool,
}

impl Default for BackboneConfig {
    fn default() -> Self {
        Self {
            ignore_annotations: vec!["JsonIgnore".to_string(), "Transient".to_string()],
            property_name_annotations: vec!["JsonProperty".to_string(), "SerializedName".to_string()],
            deprecated_annotations: vec!["Deprecated".to_string()],
            allow_unknown_types: false,
        }
    }
}

#[derive(Default)]
pub struct BackbonePlugin {
    config: BackboneConfig,
}

impl BackbonePlugin {
    pub fn new(config: BackboneConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &serde_yaml::Value) -> Result<Self> {
        Ok(Self::new(plugin_config(NAME, config)?))
    }

    fn deprecated(&self, annotations: &[Annotation]) -> Option<bool> {
        find_annotation(annotations, &self.config.deprecated_annotations).map(|_| true)
    }

    /// Whether a field is left out of its owner's schema
    fn is_skipped(&self, field: &FieldInfo) -> bool {
        if field.is_static {
            return true;
        }
        let serde_skip = field.annotations.iter().filter(|a| a.is("serde")).any(|a| {
            ["skip", "skip_serializing"]
                .iter()
                .any(|k| a.get(k).and_then(AnnotationValue::as_bool).unwrap_or(false))
        });
        let ignored = find_annotation(&field.annotations, &self.config.ignore_annotations)
            .map(|a| a.get("value").and_then(AnnotationValue::as_bool).unwrap_or(true))
            .unwrap_or(false);
        serde_skip || ignored
    }

    /// The serialized name of a field
    fn property_name(&self, field: &FieldInfo, declared_in: Option<&ClassInfo>) -> String {
        for serde in field.annotations.iter().filter(|a| a.is("serde")) {
            let rename = match serde.get("rename") {
                Some(AnnotationValue::Nested(nested)) => nested.get("serialize").and_then(|v| v.as_str()),
                Some(value) => value.as_str(),
                None => None,
            };
            if let Some(rename) = rename {
                return rename.to_string();
            }
        }

        let explicit = find_annotation(&field.annotations, &self.config.property_name_annotations)
            .and_then(|a| a.get("value"))
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty());
        if let Some(name) = explicit {
            return name.to_string();
        }

        declared_in
            .into_iter()
            .flat_map(|class| class.annotations.iter())
            .filter(|a| a.is("serde"))
            .find_map(|a| a.get("rename_all").and_then(|v| v.as_str()))
            .map(|rule| apply_case(rule, &field.name))
            .unwrap_or_else(|| field.name.clone())
    }
}

/// Apply a serde `rename_all` rule to a field name
pub fn apply_case(rule: &str, name: &str) -> String {
    let capitalize = |word: &str| {
        let mut chars = word.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        }
    };
    let words: Vec<&str> = name.split('_').filter(|w| !w.is_empty()).collect();

    match rule {
        "camelCase" => words
            .iter()
            .enumerate()
            .map(|(i, w)| if i == 0 { w.to_string() } else { capitalize(w) })
            .collect(),
        "PascalCase" => words.iter().map(|w| capitalize(w)).collect(),
        "lowercase" => name.to_lowercase(),
        "UPPERCASE" => name.to_uppercase(),
        "SCREAMING_SNAKE_CASE" => name.to_uppercase(),
        "kebab-case" => name.replace('_', "-"),
        "SCREAMING-KEBAB-CASE" => name.replace('_', "-").to_uppercase(),
        _ => name.to_string(),
    }
}

/// The endpoint name: the endpoint annotation's `value`, or the simple class name
pub fn endpoint_name(class: &ClassInfo, endpoint_annotations: &[String]) -> String {
    class
        .annotation(endpoint_annotations)
        .and_then(|a| a.get("value"))
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| class.simple_name())
        .to_string()
}

/// The schema keywords a type use contributes by itself
fn type_shape(ty: &TypeRef) -> Schema {
    match ty {
        TypeRef::Primitive(primitive) | TypeRef::Boxed(primitive) => Schema::primitive(*primitive),
        TypeRef::Array(_) => Schema::of_type("array"),
        TypeRef::Map(_, _) | TypeRef::Any | TypeRef::Var(_) | TypeRef::Wildcard { .. } => {
            Schema::of_type("object")
        }
        TypeRef::Optional(_) | TypeRef::Class { .. } | TypeRef::Void => Schema::default(),
    }
}

impl Plugin for BackbonePlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn order(&self) -> i32 {
        -100
    }

    fn enter(&self, path: &NodePath, ctx: &mut PluginContext) -> Result<()> {
        let id = ctx.current_id(path)?;
        let source = ctx.graph.source(id).clone();

        match source {
            SourceEntity::Endpoint { class } => {
                let info = ctx.types.require_class(&class)?;
                let name = endpoint_name(info, &ctx.config.endpoint_annotations);
                debug!("Endpoint {} named {}", class, name);
                if let Some(endpoint) = ctx.graph.require_target_mut(id)?.endpoint_mut() {
                    endpoint.name = name;
                }
            }
            SourceEntity::Method { method, .. } => {
                let endpoint_name = path
                    .parent()
                    .and_then(|parent| match ctx.graph.target(parent) {
                        TargetFragment::Endpoint(endpoint) => Some(endpoint.name.clone()),
                        _ => None,
                    })
                    .ok_or_else(|| {
                        Error::Configuration(format!("method {} is not nested in an endpoint", method.name))
                    })?;
                let deprecated = self.deprecated(&method.annotations);
                if let Some(operation) = ctx.graph.require_target_mut(id)?.operation_mut() {
                    operation.path = format!("/{}/{}", endpoint_name, method.name);
                    operation.operation.operation_id = format!("{}_{}", endpoint_name, method.name);
                    operation.operation.tags = vec![endpoint_name];
                    if operation.operation.deprecated.is_none() {
                        operation.operation.deprecated = deprecated;
                    }
                }
            }
            SourceEntity::Parameter { parameter, .. } => {
                if let Some(property) = ctx.graph.require_target_mut(id)?.property_mut() {
                    property.required = !parameter.ty.is_optional();
                }
            }
            SourceEntity::Property { declared_in, field, .. } => {
                let name = self.property_name(&field, ctx.types.class(&declared_in));
                let deprecated = self.deprecated(&field.annotations);
                if let Some(property) = ctx.graph.require_target_mut(id)?.property_mut() {
                    property.name = name;
                    property.required = !field.ty.is_optional();
                    property.schema.merge(Schema {
                        deprecated,
                        ..Schema::default()
                    });
                }
            }
            SourceEntity::Entity { class, .. } => {
                let info = ctx.types.require_class(&class)?;
                let mut shape = if info.is_enum() {
                    Schema::string_enum(info.constants.clone())
                } else {
                    Schema::object()
                };
                shape.deprecated = self.deprecated(&info.annotations);
                if let Some(schema) = ctx.graph.require_target_mut(id)?.schema_mut() {
                    schema.merge(shape);
                }
            }
            SourceEntity::TypeUse { ty, .. } => {
                let mut shape = type_shape(&ty);
                if let TypeRef::Class { name, .. } = &ty {
                    if ctx.types.class(name).is_none() {
                        if !self.config.allow_unknown_types {
                            return Err(Error::UnknownType(name.clone()));
                        }
                        warn!("Type {} is not in the type model, using a free-form object", name);
                        shape = Schema::of_type("object");
                    }
                }
                if let Some(schema) = ctx.graph.require_target_mut(id)?.schema_mut() {
                    schema.merge(shape);
                }
            }
            SourceEntity::Union { .. } => {}
        }
        Ok(())
    }

    fn scan(&self, path: &NodePath, deps: &mut Dependencies, ctx: &mut PluginContext) -> Result<()> {
        let id = ctx.current_id(path)?;
        let node = ctx.graph.node(id);
        let owner = node.identity.clone();

        match &node.source {
            SourceEntity::Endpoint { class } => {
                let info = ctx.types.require_class(class)?;
                let bound = BoundClass {
                    class: info,
                    bindings: generics::bind(&info.type_params, &[]),
                };
                for method in info.methods.iter().filter(|m| m.is_public && !m.is_static) {
                    deps.add_child(SourceEntity::Method {
                        endpoint: info.name.clone(),
                        declared_in: info.name.clone(),
                        method: bound.resolve_method(method),
                    });
                }
            }
            SourceEntity::Method { declared_in, method, .. } => {
                for parameter in &method.parameters {
                    deps.add_child(SourceEntity::Parameter {
                        method: owner.clone(),
                        declared_in: declared_in.clone(),
                        parameter: parameter.clone(),
                    });
                }
                if !method.return_type.is_void() {
                    deps.add_child(SourceEntity::TypeUse {
                        owner,
                        slot: TypeSlot::Return,
                        ty: method.return_type.clone(),
                    });
                }
            }
            SourceEntity::Parameter { parameter, .. } => deps.add_child(SourceEntity::TypeUse {
                owner,
                slot: TypeSlot::Declared,
                ty: parameter.ty.clone(),
            }),
            SourceEntity::Property { field, .. } => deps.add_child(SourceEntity::TypeUse {
                owner,
                slot: TypeSlot::Declared,
                ty: field.ty.clone(),
            }),
            SourceEntity::Entity { class, args } => {
                let Some(info) = ctx.types.class(class) else {
                    return Ok(());
                };
                if info.is_enum() {
                    return Ok(());
                }
                // superclass fields first
                for bound in ctx.types.supertype_chain(info, args).iter().rev() {
                    for field in bound.class.fields.iter().filter(|f| !self.is_skipped(f)) {
                        let mut resolved = field.clone();
                        resolved.ty = bound.field_type(field);
                        deps.add_child(SourceEntity::Property {
                            owner: owner.clone(),
                            declared_in: bound.class.name.clone(),
                            field: resolved,
                        });
                    }
                }
            }
            SourceEntity::TypeUse { ty, .. } => match ty {
                TypeRef::Array(inner) => deps.add_child(SourceEntity::TypeUse {
                    owner,
                    slot: TypeSlot::Items,
                    ty: (**inner).clone(),
                }),
                TypeRef::Map(_, value) => deps.add_child(SourceEntity::TypeUse {
                    owner,
                    slot: TypeSlot::Values,
                    ty: (**value).clone(),
                }),
                TypeRef::Optional(inner) => deps.add_child(SourceEntity::TypeUse {
                    owner,
                    slot: TypeSlot::Inner,
                    ty: (**inner).clone(),
                }),
                TypeRef::Class { name, args } => {
                    // unknown classes were handled when the node was entered
                    if let Some(info) = ctx.types.class(name) {
                        deps.add_reference(SourceEntity::Entity {
                            class: info.name.clone(),
                            args: args.clone(),
                        });
                    }
                }
                _ => {}
            },
            SourceEntity::Union { .. } => {}
        }
        Ok(())
    }
}
