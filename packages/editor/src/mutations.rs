//! # Graph Mutations
//!
//! Intent-level edits a client applies to its local graph.
//!
//! ## Mutation Semantics
//!
//! ### DeleteNode
//! - Removes the node and every edge touching it
//!
//! ### CreateEdge
//! - Both endpoints must exist
//! - At most one edge per `(source, target)` pair
//!
//! ### UpdateNode / SetProperty
//! - Atomic replacement, last write wins

use blueprint_model::{Edge, EdgeKey, FieldValue, Graph, Node, Position, Property};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Mutation {
    CreateNode {
        node: Node,
    },

    /// Only the fields that are `Some` change
    UpdateNode {
        node_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
    },

    MoveNode {
        node_id: String,
        position: Position,
    },

    DeleteNode {
        node_id: String,
    },

    CreateEdge {
        edge: Edge,
    },

    DeleteEdge {
        source: String,
        target: String,
    },

    SetProperty {
        node_id: String,
        property_id: String,
        value: FieldValue,
    },

    AddProperty {
        node_id: String,
        property: Property,
    },

    RemoveProperty {
        node_id: String,
        property_id: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node already exists: {0}")]
    DuplicateNode(String),

    #[error("Edge endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("Edge already exists: {0}")]
    DuplicateEdge(EdgeKey),

    #[error("Edge not found: {0}")]
    EdgeNotFound(EdgeKey),

    #[error("Node `{node}` has no property `{property}`")]
    PropertyNotFound { node: String, property: String },

    #[error("Node `{node}` already has property `{property}`")]
    DuplicateProperty { node: String, property: String },
}

impl Mutation {
    /// Apply mutation to the graph with validation. A rejected mutation
    /// leaves the graph untouched.
    pub fn apply(&self, graph: &mut Graph) -> Result<(), MutationError> {
        self.validate(graph)?;

        match self {
            Mutation::CreateNode { node } => {
                graph.nodes.push(node.clone());
            }

            Mutation::UpdateNode {
                node_id,
                title,
                prompt,
            } => {
                let node = Self::node_mut(graph, node_id)?;
                if let Some(title) = title {
                    node.title = title.clone();
                }
                if let Some(prompt) = prompt {
                    node.prompt = prompt.clone();
                }
            }

            Mutation::MoveNode { node_id, position } => {
                Self::node_mut(graph, node_id)?.position = *position;
            }

            Mutation::DeleteNode { node_id } => {
                graph.nodes.retain(|n| &n.id != node_id);
                graph
                    .edges
                    .retain(|e| &e.source != node_id && &e.target != node_id);
            }

            Mutation::CreateEdge { edge } => {
                graph.edges.push(edge.clone());
            }

            Mutation::DeleteEdge { source, target } => {
                graph
                    .edges
                    .retain(|e| !(&e.source == source && &e.target == target));
            }

            Mutation::SetProperty {
                node_id,
                property_id,
                value,
            } => {
                let node = Self::node_mut(graph, node_id)?;
                let property = node.property_mut(property_id).ok_or_else(|| {
                    MutationError::PropertyNotFound {
                        node: node_id.clone(),
                        property: property_id.clone(),
                    }
                })?;
                property.value = value.clone();
            }

            Mutation::AddProperty { node_id, property } => {
                Self::node_mut(graph, node_id)?
                    .properties
                    .push(property.clone());
            }

            Mutation::RemoveProperty {
                node_id,
                property_id,
            } => {
                Self::node_mut(graph, node_id)?
                    .properties
                    .retain(|p| &p.id != property_id);
            }
        }

        Ok(())
    }

    /// Validate without applying
    pub fn validate(&self, graph: &Graph) -> Result<(), MutationError> {
        match self {
            Mutation::CreateNode { node } => {
                if graph.contains_node(&node.id) {
                    return Err(MutationError::DuplicateNode(node.id.clone()));
                }
                Ok(())
            }

            Mutation::UpdateNode { node_id, .. }
            | Mutation::MoveNode { node_id, .. }
            | Mutation::DeleteNode { node_id } => Self::require_node(graph, node_id),

            Mutation::CreateEdge { edge } => {
                for endpoint in [&edge.source, &edge.target] {
                    if !graph.contains_node(endpoint) {
                        return Err(MutationError::EndpointNotFound(endpoint.clone()));
                    }
                }
                if graph.edge(&edge.source, &edge.target).is_some() {
                    return Err(MutationError::DuplicateEdge(edge.key()));
                }
                Ok(())
            }

            Mutation::DeleteEdge { source, target } => {
                if graph.edge(source, target).is_none() {
                    return Err(MutationError::EdgeNotFound(EdgeKey::new(source, target)));
                }
                Ok(())
            }

            Mutation::SetProperty {
                node_id,
                property_id,
                ..
            }
            | Mutation::RemoveProperty {
                node_id,
                property_id,
            } => {
                let node = graph
                    .node(node_id)
                    .ok_or_else(|| MutationError::NodeNotFound(node_id.clone()))?;
                if node.property(property_id).is_none() {
                    return Err(MutationError::PropertyNotFound {
                        node: node_id.clone(),
                        property: property_id.clone(),
                    });
                }
                Ok(())
            }

            Mutation::AddProperty { node_id, property } => {
                let node = graph
                    .node(node_id)
                    .ok_or_else(|| MutationError::NodeNotFound(node_id.clone()))?;
                if node.property(&property.id).is_some() {
                    return Err(MutationError::DuplicateProperty {
                        node: node_id.clone(),
                        property: property.id.clone(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::CreateNode { .. } => "create-node",
            Mutation::UpdateNode { .. } => "update-node",
            Mutation::MoveNode { .. } => "move-node",
            Mutation::DeleteNode { .. } => "delete-node",
            Mutation::CreateEdge { .. } => "create-edge",
            Mutation::DeleteEdge { .. } => "delete-edge",
            Mutation::SetProperty { .. } => "set-property",
            Mutation::AddProperty { .. } => "add-property",
            Mutation::RemoveProperty { .. } => "remove-property",
        }
    }

    fn require_node(graph: &Graph, node_id: &str) -> Result<(), MutationError> {
        if graph.contains_node(node_id) {
            Ok(())
        } else {
            Err(MutationError::NodeNotFound(node_id.to_string()))
        }
    }

    fn node_mut<'a>(graph: &'a mut Graph, node_id: &str) -> Result<&'a mut Node, MutationError> {
        graph
            .node_mut(node_id)
            .ok_or_else(|| MutationError::NodeNotFound(node_id.to_string()))
    }
}
