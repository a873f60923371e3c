//! Arena of nodes keyed by resolved identity.

use crate::error::{Error, Result};
use crate::node::{
    EntityId, Node, NodeDraft, NodeId, NodeState, SourceEntity, TargetFragment, TypeSlot,
};
use crate::openapi::Schema;
use log::debug;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    by_identity: HashMap<EntityId, NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the node for a draft, or return the node that already exists
    /// for its identity. The flag tells whether a node was created.
    pub fn create_node(&mut self, draft: NodeDraft, parent: Option<NodeId>) -> (NodeId, bool) {
        let identity = draft.identity();
        if let Some(&existing) = self.by_identity.get(&identity) {
            return (existing, false);
        }

        let id = NodeId(self.nodes.len());
        debug!("Creating node {:?} for {}", id, identity);
        self.by_identity.insert(identity.clone(), id);
        self.nodes.push(Node {
            id,
            identity,
            source: draft.source,
            target: draft.target,
            state: NodeState::Discovered,
            parent,
            children: Vec::new(),
            references: Vec::new(),
        });
        (id, true)
    }

    pub fn find(&self, identity: &EntityId) -> Option<NodeId> {
        self.by_identity.get(identity).copied()
    }

    /// Panics on an id from another graph
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn source(&self, id: NodeId) -> &SourceEntity {
        &self.node(id).source
    }

    pub fn target(&self, id: NodeId) -> &TargetFragment {
        &self.node(id).target
    }

    /// Mutable access to a fragment; exited nodes are immutable
    pub fn target_mut(&mut self, id: NodeId) -> Option<&mut TargetFragment> {
        let node = &mut self.nodes[id.0];
        if node.is_exited() {
            None
        } else {
            Some(&mut node.target)
        }
    }

    /// Like [`Graph::target_mut`], failing for exited nodes
    pub fn require_target_mut(&mut self, id: NodeId) -> Result<&mut TargetFragment> {
        let identity = self.nodes[id.0].identity.clone();
        self.target_mut(id)
            .ok_or_else(|| Error::Configuration(format!("node `{}` is exited and immutable", identity)))
    }

    pub fn set_state(&mut self, id: NodeId, state: NodeState) {
        self.nodes[id.0].state = state;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Whether `ancestor` is `id` or one of the nodes it is nested in
    fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.nodes[node.0].parent;
        }
        false
    }

    /// Merge a finished child's fragment into its parent's fragment.
    ///
    /// Cycles are never embedded by value: attaching a node into itself or into
    /// one of its own descendants is a [`Error::CycleViolation`].
    pub fn attach_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.is_ancestor_or_self(child, parent) {
            return Err(Error::CycleViolation(self.nodes[child.0].identity.to_string()));
        }

        let child_node = &self.nodes[child.0];
        let fragment = child_node.target.clone();
        let slot = match &child_node.source {
            SourceEntity::TypeUse { slot, .. } => Some(*slot),
            _ => None,
        };
        let child_identity = child_node.identity.clone();

        if let TargetFragment::Operation(operation) = &fragment {
            if let Some(taken) = self.operation_at(parent, &operation.path).filter(|&id| id != child) {
                return Err(Error::Configuration(format!(
                    "`{}` and `{}` both map to {}",
                    self.nodes[taken.0].identity, child_identity, operation.path
                )));
            }
        }

        let target = self.require_target_mut(parent)?;
        match (target, fragment) {
            (TargetFragment::Endpoint(endpoint), TargetFragment::Operation(operation)) => {
                let built = operation
                    .operation
                    .with_bodies(operation.request, operation.response);
                endpoint.operations.insert(operation.path, built);
            }
            (TargetFragment::Operation(operation), TargetFragment::Property(parameter)) => {
                operation
                    .request
                    .add_property(&parameter.name, parameter.schema, parameter.required);
            }
            (TargetFragment::Operation(operation), TargetFragment::Schema(schema)) => {
                match &mut operation.response {
                    Some(response) => response.merge(schema),
                    None => operation.response = Some(schema),
                }
            }
            (TargetFragment::Schema(owner), TargetFragment::Property(property)) => {
                owner.add_property(&property.name, property.schema, property.required);
            }
            (TargetFragment::Property(property), TargetFragment::Schema(schema)) => {
                property.schema.merge(schema);
            }
            (TargetFragment::Schema(owner), TargetFragment::Schema(schema)) => match slot {
                Some(TypeSlot::Items) => merge_boxed(&mut owner.items, schema),
                Some(TypeSlot::Values) => merge_boxed(&mut owner.additional_properties, schema),
                _ => owner.merge(schema),
            },
            (parent_fragment, child_fragment) => {
                return Err(Error::Configuration(format!(
                    "cannot attach {} fragment of `{}` to a {} fragment",
                    fragment_kind(&child_fragment),
                    child_identity,
                    fragment_kind(parent_fragment)
                )));
            }
        }

        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// The attached operation child of `parent` that owns `path`
    fn operation_at(&self, parent: NodeId, path: &str) -> Option<NodeId> {
        self.nodes[parent.0].children.iter().copied().find(|&id| {
            matches!(&self.nodes[id.0].target, TargetFragment::Operation(op) if op.path == path)
        })
    }

    /// Embed a named reference to a component schema into a node's fragment
    pub fn attach_reference(&mut self, id: NodeId, component: &str) -> Result<()> {
        let target = self.require_target_mut(id)?;
        match target.schema_mut() {
            Some(schema) => schema.merge(Schema::reference(component)),
            None => {
                return Err(Error::Configuration(format!(
                    "cannot reference `{}` from a {} fragment",
                    component,
                    fragment_kind(target)
                )))
            }
        }
        self.nodes[id.0].references.push(component.to_string());
        Ok(())
    }
}

fn merge_boxed(slot: &mut Option<Box<Schema>>, schema: Schema) {
    match slot {
        Some(existing) => existing.merge(schema),
        None => *slot = Some(Box::new(schema)),
    }
}

fn fragment_kind(fragment: &TargetFragment) -> &'static str {
    match fragment {
        TargetFragment::Endpoint(_) => "endpoint",
        TargetFragment::Operation(_) => "operation",
        TargetFragment::Schema(_) => "schema",
        TargetFragment::Property(_) => "property",
    }
}
