//! Nodes pair a source entity with the fragment of the document it contributes.

use crate::openapi::{Operation, Schema};
use crate::type_model::{FieldInfo, MethodInfo, ParameterInfo, TypeRef};
use indexmap::IndexMap;
use std::fmt;

/// Index of a node in its [`Graph`](crate::graph::Graph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// The stable identity of a resolved source entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The position a type use occupies in its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeSlot {
    /// Declared type of a property or parameter
    Declared,
    /// Return type of a method
    Return,
    /// Element type of an array
    Items,
    /// Value type of a map
    Values,
    /// Wrapped type of an optional
    Inner,
}

impl TypeSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeSlot::Declared => "type",
            TypeSlot::Return => "return",
            TypeSlot::Items => "items",
            TypeSlot::Values => "values",
            TypeSlot::Inner => "inner",
        }
    }
}

/// A named subtype of a polymorphic base
#[derive(Debug, Clone, PartialEq)]
pub struct UnionVariant {
    /// Discriminator value
    pub name: String,
    /// Fully qualified class name
    pub class: String,
}

/// An immutable reference to a reflected program element
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEntity {
    /// An endpoint class
    Endpoint { class: String },
    /// A method exposed on an endpoint, with generic types resolved
    Method {
        endpoint: String,
        declared_in: String,
        method: MethodInfo,
    },
    /// A method parameter, with its type resolved
    Parameter {
        method: EntityId,
        declared_in: String,
        parameter: ParameterInfo,
    },
    /// An entity class reached with concrete type arguments
    Entity { class: String, args: Vec<TypeRef> },
    /// A polymorphic base class replaced by the union of its subtypes
    Union {
        base: String,
        property: String,
        variants: Vec<UnionVariant>,
    },
    /// A field of an entity, with its type resolved
    Property {
        owner: EntityId,
        declared_in: String,
        field: FieldInfo,
    },
    /// A type at a position inside its owner
    TypeUse {
        owner: EntityId,
        slot: TypeSlot,
        ty: TypeRef,
    },
}

/// Name of the component schema for a (possibly generic) class
pub fn component_name(class: &str, args: &[TypeRef]) -> String {
    let base = class.replace("::", ".");
    if args.is_empty() {
        return base;
    }
    let args: Vec<String> = args
        .iter()
        .map(|a| {
            a.to_string()
                .replace("::", ".")
                .replace(", ", "_")
                .replace(['<', '>'], "_")
                .trim_end_matches('_')
                .to_string()
        })
        .collect();
    format!("{}_{}", base, args.join("_"))
}

impl SourceEntity {
    /// The identity used for deduplication and the visited set
    pub fn identity(&self) -> EntityId {
        let identity = match self {
            SourceEntity::Endpoint { class } => format!("endpoint:{}", class),
            SourceEntity::Method { endpoint, method, .. } => {
                format!("method:{}#{}", endpoint, method.signature())
            }
            SourceEntity::Parameter { method, parameter, .. } => {
                format!("parameter:{}/{}", method, parameter.name)
            }
            SourceEntity::Entity { class, args } => format!(
                "entity:{}",
                TypeRef::Class {
                    name: class.clone(),
                    args: args.clone(),
                }
            ),
            SourceEntity::Union { base, .. } => format!("entity:{}", base),
            SourceEntity::Property { owner, field, .. } => format!("property:{}.{}", owner, field.name),
            SourceEntity::TypeUse { owner, slot, ty } => {
                format!("type:{}/{}:{}", owner, slot.as_str(), ty)
            }
        };
        EntityId(identity)
    }

    /// Name of the component schema, for entities that get one
    pub fn component_name(&self) -> Option<String> {
        match self {
            SourceEntity::Entity { class, args } => Some(component_name(class, args)),
            SourceEntity::Union { base, .. } => Some(component_name(base, &[])),
            _ => None,
        }
    }

    /// The class whose schema this entity describes, if any
    pub fn class_name(&self) -> Option<&str> {
        match self {
            SourceEntity::Endpoint { class } | SourceEntity::Entity { class, .. } => Some(class),
            SourceEntity::Union { base, .. } => Some(base),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SourceEntity::Endpoint { .. } => "endpoint",
            SourceEntity::Method { .. } => "method",
            SourceEntity::Parameter { .. } => "parameter",
            SourceEntity::Entity { .. } => "entity",
            SourceEntity::Union { .. } => "union",
            SourceEntity::Property { .. } => "property",
            SourceEntity::TypeUse { .. } => "type",
        }
    }
}

/// Endpoint tag plus its operations keyed by path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointFragment {
    pub name: String,
    pub class_name: String,
    pub operations: IndexMap<String, Operation>,
}

/// One operation with its request object and response schemas
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationFragment {
    pub path: String,
    pub operation: Operation,
    /// Object schema with one property per parameter
    pub request: Schema,
    pub response: Option<Schema>,
}

/// A named entry of an object schema (property or request parameter)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyFragment {
    pub name: String,
    pub schema: Schema,
    pub required: bool,
}

/// The part of the output document a node contributes
#[derive(Debug, Clone, PartialEq)]
pub enum TargetFragment {
    Endpoint(EndpointFragment),
    Operation(OperationFragment),
    Schema(Schema),
    Property(PropertyFragment),
}

impl TargetFragment {
    /// The empty fragment matching a source entity
    pub fn for_source(source: &SourceEntity) -> Self {
        match source {
            SourceEntity::Endpoint { class } => TargetFragment::Endpoint(EndpointFragment {
                class_name: class.clone(),
                ..EndpointFragment::default()
            }),
            SourceEntity::Method { .. } => TargetFragment::Operation(OperationFragment {
                request: Schema::object(),
                ..OperationFragment::default()
            }),
            SourceEntity::Parameter { parameter, .. } => TargetFragment::Property(PropertyFragment {
                name: parameter.name.clone(),
                ..PropertyFragment::default()
            }),
            SourceEntity::Property { field, .. } => TargetFragment::Property(PropertyFragment {
                name: field.name.clone(),
                ..PropertyFragment::default()
            }),
            SourceEntity::Entity { .. } | SourceEntity::Union { .. } | SourceEntity::TypeUse { .. } => {
                TargetFragment::Schema(Schema::default())
            }
        }
    }

    pub fn as_schema(&self) -> Option<&Schema> {
        match self {
            TargetFragment::Schema(schema) => Some(schema),
            TargetFragment::Property(property) => Some(&property.schema),
            _ => None,
        }
    }

    /// The schema of a schema or property fragment
    pub fn schema_mut(&mut self) -> Option<&mut Schema> {
        match self {
            TargetFragment::Schema(schema) => Some(schema),
            TargetFragment::Property(property) => Some(&mut property.schema),
            _ => None,
        }
    }

    pub fn property_mut(&mut self) -> Option<&mut PropertyFragment> {
        match self {
            TargetFragment::Property(property) => Some(property),
            _ => None,
        }
    }

    pub fn operation_mut(&mut self) -> Option<&mut OperationFragment> {
        match self {
            TargetFragment::Operation(operation) => Some(operation),
            _ => None,
        }
    }

    pub fn endpoint_mut(&mut self) -> Option<&mut EndpointFragment> {
        match self {
            TargetFragment::Endpoint(endpoint) => Some(endpoint),
            _ => None,
        }
    }
}

/// Processing state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeState {
    Discovered,
    Resolved,
    Scanned,
    ChildrenProcessed,
    Exited,
}

/// A source entity paired with its fragment, before it becomes a node.
/// Plugins may replace either half during resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDraft {
    pub source: SourceEntity,
    pub target: TargetFragment,
}

impl NodeDraft {
    pub fn new(source: SourceEntity) -> Self {
        let target = TargetFragment::for_source(&source);
        Self { source, target }
    }

    pub fn identity(&self) -> EntityId {
        self.source.identity()
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub identity: EntityId,
    pub source: SourceEntity,
    pub(crate) target: TargetFragment,
    pub state: NodeState,
    /// The node this one is nested in; `None` for roots
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Component names this node refers to
    pub references: Vec<String>,
}

impl Node {
    pub fn target(&self) -> &TargetFragment {
        &self.target
    }

    pub fn is_exited(&self) -> bool {
        self.state == NodeState::Exited
    }
}

/// The nodes from a root to the current node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodePath(Vec<NodeId>);

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// A new path extended by `id`
    pub fn child(&self, id: NodeId) -> Self {
        let mut ids = self.0.clone();
        ids.push(id);
        Self(ids)
    }

    /// The node being processed
    pub fn current(&self) -> Option<NodeId> {
        self.0.last().copied()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.0.iter().rev().nth(1).copied()
    }

    /// Enclosing nodes, nearest first, excluding the current node
    pub fn ancestors(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.0.iter().rev().skip(1).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entity_identity_includes_arguments() {
        let plain = SourceEntity::Entity {
            class: "com.example.Page".to_string(),
            args: vec![],
        };
        let bound = SourceEntity::Entity {
            class: "com.example.Page".to_string(),
            args: vec![TypeRef::class("com.example.User")],
        };
        assert_eq!(plain.identity().as_str(), "entity:com.example.Page");
        assert_eq!(bound.identity().as_str(), "entity:com.example.Page<com.example.User>");
    }

    #[test]
    fn test_union_shares_identity_with_its_base() {
        let entity = SourceEntity::Entity {
            class: "com.example.Animal".to_string(),
            args: vec![],
        };
        let union = SourceEntity::Union {
            base: "com.example.Animal".to_string(),
            property: "kind".to_string(),
            variants: vec![],
        };
        assert_eq!(entity.identity(), union.identity());
    }

    #[test]
    fn test_component_names() {
        assert_eq!(component_name("crate::model::User", &[]), "crate.model.User");
        assert_eq!(
            component_name(
                "com.example.Wrapper",
                &[TypeRef::parse("Map<string, com.example.User>").unwrap()]
            ),
            "com.example.Wrapper_Map_string_com.example.User"
        );
    }

    #[test]
    fn test_node_path() {
        let path = NodePath::root().child(NodeId(0)).child(NodeId(3)).child(NodeId(7));
        assert_eq!(path.current(), Some(NodeId(7)));
        assert_eq!(path.parent(), Some(NodeId(3)));
        assert_eq!(path.ancestors().collect::<Vec<_>>(), vec![NodeId(3), NodeId(0)]);
        assert!(NodePath::root().parent().is_none());
    }
}
