//! Graph diffing and build-state derivation

use blueprint_model::{EdgeKey, Graph, Node};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Result of comparing a base snapshot with the current graph.
///
/// Node lists hold ids; edge lists hold `(source, target)` keys. Added and
/// modified entries follow the current graph's order, deleted entries the
/// base graph's order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDiff {
    pub added_nodes: Vec<String>,
    pub modified_nodes: Vec<String>,
    pub deleted_nodes: Vec<String>,
    pub added_edges: Vec<EdgeKey>,
    pub deleted_edges: Vec<EdgeKey>,
}

impl GraphDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.modified_nodes.is_empty()
            && self.deleted_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.deleted_edges.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.added_nodes.len()
            + self.modified_nodes.len()
            + self.deleted_nodes.len()
            + self.added_edges.len()
            + self.deleted_edges.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    Built,
    Unbuilt,
}

/// Build state of one node, as exposed on the request surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeBuildState {
    pub id: String,
    pub state: BuildState,
}

/// Compare `current` against `base`. Without a base every node and edge of
/// `current` is added.
pub fn compare(base: Option<&Graph>, current: &Graph) -> GraphDiff {
    let mut diff = GraphDiff::new();

    let base_nodes: HashMap<&str, &Node> = base
        .map(|b| b.nodes.iter().map(|n| (n.id.as_str(), n)).collect())
        .unwrap_or_default();
    let current_ids = current.node_ids();

    for node in &current.nodes {
        match base_nodes.get(node.id.as_str()) {
            None => diff.added_nodes.push(node.id.clone()),
            Some(old) if !old.same_text(node) => diff.modified_nodes.push(node.id.clone()),
            Some(_) => {}
        }
    }

    if let Some(base) = base {
        for node in &base.nodes {
            if !current_ids.contains(node.id.as_str()) {
                diff.deleted_nodes.push(node.id.clone());
            }
        }
    }

    let base_edges: HashSet<EdgeKey> = base.map(Graph::edge_keys).unwrap_or_default();
    let current_edges = current.edge_keys();

    let mut seen = HashSet::new();
    for edge in &current.edges {
        let key = edge.key();
        if !base_edges.contains(&key) && seen.insert(key.clone()) {
            diff.added_edges.push(key);
        }
    }

    if let Some(base) = base {
        let mut seen = HashSet::new();
        for edge in &base.edges {
            let key = edge.key();
            if !current_edges.contains(&key) && seen.insert(key.clone()) {
                diff.deleted_edges.push(key);
            }
        }
    }

    tracing::debug!(
        added = diff.added_nodes.len(),
        modified = diff.modified_nodes.len(),
        deleted = diff.deleted_nodes.len(),
        "compared graph against base"
    );

    diff
}

/// Built iff `base` has a node with the same id and identical title and prompt
pub fn derive_build_state(node: &Node, base: Option<&Graph>) -> BuildState {
    match base.and_then(|b| b.node(&node.id)) {
        Some(built) if built.same_text(node) => BuildState::Built,
        _ => BuildState::Unbuilt,
    }
}

/// Build state of every node in `current`, in node order
pub fn build_states(current: &Graph, base: Option<&Graph>) -> Vec<NodeBuildState> {
    current
        .nodes
        .iter()
        .map(|node| NodeBuildState {
            id: node.id.clone(),
            state: derive_build_state(node, base),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_model::{Edge, Property};

    fn sample() -> Graph {
        Graph::new()
            .with_node(Node::new("a", "A").with_prompt("P"))
            .with_node(Node::new("b", "B"))
            .with_edge(Edge::new("e1", "a", "b"))
    }

    #[test]
    fn test_compare_is_reflexive() {
        let graph = sample();
        let diff = compare(Some(&graph), &graph);
        assert!(diff.is_empty());
        assert_eq!(diff.change_count(), 0);
    }

    #[test]
    fn test_no_baseline_marks_everything_added() {
        let graph = sample();
        let diff = compare(None, &graph);
        assert_eq!(diff.added_nodes, vec!["a", "b"]);
        assert_eq!(diff.added_edges, vec![EdgeKey::new("a", "b")]);
        assert!(diff.modified_nodes.is_empty());
        assert!(diff.deleted_nodes.is_empty());
        assert!(diff.deleted_edges.is_empty());
    }

    #[test]
    fn test_property_edit_keeps_node_built() {
        let base = sample();
        let mut current = sample();
        current.nodes[0]
            .properties
            .push(Property::color("bg", "Background", "#000"));
        current.nodes[0].position.x = 400.0;

        let diff = compare(Some(&base), &current);
        assert!(diff.is_empty());
        assert_eq!(derive_build_state(&current.nodes[0], Some(&base)), BuildState::Built);
    }

    #[test]
    fn test_title_edit_marks_modified_and_unbuilt() {
        let base = sample();
        let mut current = sample();
        current.nodes[0].title = "Renamed".to_string();

        let diff = compare(Some(&base), &current);
        assert_eq!(diff.modified_nodes, vec!["a"]);
        assert_eq!(derive_build_state(&current.nodes[0], Some(&base)), BuildState::Unbuilt);
    }

    #[test]
    fn test_prompt_edit_marks_modified() {
        let base = sample();
        let mut current = sample();
        current.nodes[1].prompt = "now with a description".to_string();

        assert_eq!(compare(Some(&base), &current).modified_nodes, vec!["b"]);
    }

    #[test]
    fn test_deletions() {
        let base = sample();
        let current = Graph::new().with_node(Node::new("a", "A").with_prompt("P"));

        let diff = compare(Some(&base), &current);
        assert_eq!(diff.deleted_nodes, vec!["b"]);
        assert_eq!(diff.deleted_edges, vec![EdgeKey::new("a", "b")]);
    }

    #[test]
    fn test_edges_compared_by_key_not_id() {
        let base = sample();
        let mut current = sample();
        current.edges[0].id = "renamed-edge".to_string();
        assert!(compare(Some(&base), &current).is_empty());

        current.edges[0] = Edge::new("e1", "b", "a");
        let diff = compare(Some(&base), &current);
        assert_eq!(diff.added_edges, vec![EdgeKey::new("b", "a")]);
        assert_eq!(diff.deleted_edges, vec![EdgeKey::new("a", "b")]);
    }

    #[test]
    fn test_build_states_without_base() {
        let states = build_states(&sample(), None);
        assert!(states.iter().all(|s| s.state == BuildState::Unbuilt));
        assert_eq!(states.len(), 2);
    }

    #[test]
    fn test_diff_json_shape() {
        let diff = compare(None, &sample());
        let json = serde_json::to_value(&diff).unwrap();
        assert_eq!(json["addedNodes"], serde_json::json!(["a", "b"]));
        assert_eq!(json["addedEdges"][0]["source"], "a");
    }
}
