use blueprint_model::{EdgeKey, Graph};
use std::collections::HashSet;

/// Merge an incoming snapshot into the local graph.
///
/// Nodes present on both sides take every field from `incoming` except the
/// position, which stays local. Incoming-only nodes are appended after the
/// local order. Local-only nodes are kept: deletions only arrive through an
/// authoritative refresh.
///
/// Edges come from `incoming`, plus local-only edges whose endpoints still
/// exist in the result.
pub fn reconcile(local: &Graph, incoming: &Graph) -> Graph {
    let mut merged = Graph::new();

    for node in &local.nodes {
        match incoming.node(&node.id) {
            Some(theirs) => {
                let mut node_merged = theirs.clone();
                node_merged.position = node.position;
                merged.nodes.push(node_merged);
            }
            None => merged.nodes.push(node.clone()),
        }
    }

    let local_ids = local.node_ids();
    merged.nodes.extend(
        incoming
            .nodes
            .iter()
            .filter(|n| !local_ids.contains(n.id.as_str()))
            .cloned(),
    );

    merged.edges = incoming.edges.clone();
    let incoming_keys: HashSet<EdgeKey> = incoming.edge_keys();
    let node_ids = merged.node_ids();
    let kept: Vec<_> = local
        .edges
        .iter()
        .filter(|e| !incoming_keys.contains(&e.key()))
        .filter(|e| node_ids.contains(e.source.as_str()) && node_ids.contains(e.target.as_str()))
        .cloned()
        .collect();
    merged.edges.extend(kept);

    merged
}
