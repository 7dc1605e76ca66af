//! # Normalization
//!
//! Runs before every persisted write. It never fails: each repair is applied,
//! recorded in the `NormalizeReport` and logged at `warn!`.
//!
//! ```text
//! duplicate node ids ─────────▶ first node wins
//! duplicate property ids ─────▶ last one wins, at the first position
//! property id used by an
//! earlier node ───────────────▶ renamed to <nodeId>-<propId>
//! value keys not in schema ───▶ schema extended with inferred kinds
//! legacy `parent` field ──────▶ edge parent -> child
//! duplicate (source, target) ─▶ first edge wins
//! edge to a missing node ─────▶ dropped
//! ```
//!
//! Applying `normalize` to its own output changes nothing.

use blueprint_model::infer::undeclared_fields;
use blueprint_model::{Edge, EdgeKey, FieldMap, FieldSchema, FieldValue, Graph, Property, ValueKind};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyRename {
    pub node_id: String,
    pub from: String,
    pub to: String,
}

/// Everything one normalization pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub dropped_nodes: Vec<String>,
    /// `(node, property)` pairs that occurred more than once in a node
    pub collapsed_properties: Vec<(String, String)>,
    pub renamed_properties: Vec<PropertyRename>,
    /// Unprefixed property id → node that keeps it
    pub ownership: BTreeMap<String, String>,
    /// `(node, property)` pairs whose schema gained inferred fields
    pub extended_schemas: Vec<(String, String)>,
    pub implied_edges: Vec<EdgeKey>,
    pub duplicate_edges: Vec<EdgeKey>,
    pub dangling_edges: Vec<EdgeKey>,
}

impl NormalizeReport {
    /// True when the pass changed nothing
    pub fn is_clean(&self) -> bool {
        self.dropped_nodes.is_empty()
            && self.collapsed_properties.is_empty()
            && self.renamed_properties.is_empty()
            && self.extended_schemas.is_empty()
            && self.implied_edges.is_empty()
            && self.duplicate_edges.is_empty()
            && self.dangling_edges.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub graph: Graph,
    pub report: NormalizeReport,
}

pub fn normalize(mut graph: Graph) -> Normalized {
    let mut report = NormalizeReport::default();

    drop_duplicate_nodes(&mut graph, &mut report);
    collapse_duplicate_properties(&mut graph, &mut report);
    rename_colliding_properties(&mut graph, &mut report);
    extend_schemas(&mut graph, &mut report);
    add_parent_edges(&mut graph, &mut report);
    dedupe_edges(&mut graph, &mut report);
    drop_dangling_edges(&mut graph, &mut report);

    Normalized { graph, report }
}

fn drop_duplicate_nodes(graph: &mut Graph, report: &mut NormalizeReport) {
    let mut seen = HashSet::new();
    graph.nodes.retain(|node| {
        if seen.insert(node.id.clone()) {
            return true;
        }
        warn!(node_id = %node.id, "dropping node with duplicate id");
        report.dropped_nodes.push(node.id.clone());
        false
    });
}

fn collapse_duplicate_properties(graph: &mut Graph, report: &mut NormalizeReport) {
    for node in &mut graph.nodes {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut kept: Vec<Property> = Vec::with_capacity(node.properties.len());

        for property in node.properties.drain(..) {
            match positions.get(&property.id) {
                Some(&at) => {
                    warn!(node_id = %node.id, property_id = %property.id, "collapsing duplicate property id");
                    report
                        .collapsed_properties
                        .push((node.id.clone(), property.id.clone()));
                    kept[at] = property;
                }
                None => {
                    positions.insert(property.id.clone(), kept.len());
                    kept.push(property);
                }
            }
        }

        node.properties = kept;
    }
}

fn rename_colliding_properties(graph: &mut Graph, report: &mut NormalizeReport) {
    // property id → owning node
    let mut owners: HashMap<String, String> = HashMap::new();

    for node in &mut graph.nodes {
        let own_ids: HashSet<String> = node.properties.iter().map(|p| p.id.clone()).collect();

        for property in &mut node.properties {
            let owner = owners
                .get(&property.id)
                .filter(|owner| **owner != node.id)
                .cloned();
            let Some(owner) = owner else {
                owners.insert(property.id.clone(), node.id.clone());
                continue;
            };

            let base = format!("{}-{}", node.id, property.id);
            let mut renamed = base.clone();
            let mut suffix = 2;
            while owners.contains_key(&renamed) || own_ids.contains(&renamed) {
                renamed = format!("{}-{}", base, suffix);
                suffix += 1;
            }

            warn!(
                node_id = %node.id,
                property_id = %property.id,
                renamed = %renamed,
                owner = %owner,
                "renaming property id already used by another node"
            );
            report.ownership.insert(property.id.clone(), owner);
            report.renamed_properties.push(PropertyRename {
                node_id: node.id.clone(),
                from: property.id.clone(),
                to: renamed.clone(),
            });

            owners.insert(renamed.clone(), node.id.clone());
            property.id = renamed;
        }
    }
}

fn extend_schemas(graph: &mut Graph, report: &mut NormalizeReport) {
    for node in &mut graph.nodes {
        for property in &mut node.properties {
            let added = conform_kind(&mut property.kind, &property.value);
            if added > 0 {
                warn!(
                    node_id = %node.id,
                    property_id = %property.id,
                    added,
                    "extending schema with inferred fields"
                );
                report
                    .extended_schemas
                    .push((node.id.clone(), property.id.clone()));
            }
        }
    }
}

/// Append schema entries for undeclared value keys, at every depth.
/// Returns how many entries were added.
fn conform_kind(kind: &mut ValueKind, value: &FieldValue) -> usize {
    match (kind, value) {
        (ValueKind::Object { fields }, FieldValue::Object(map)) => {
            conform_fields(fields, std::slice::from_ref(map))
        }
        (ValueKind::ObjectList { fields }, FieldValue::List(items)) => conform_fields(fields, items),
        _ => 0,
    }
}

fn conform_fields(fields: &mut Vec<FieldSchema>, maps: &[FieldMap]) -> usize {
    let extra = undeclared_fields(fields.as_slice(), maps);
    let mut added = extra.len();
    fields.extend(extra);

    for field in fields.iter_mut() {
        for map in maps {
            if let Some(value) = map.get(&field.id) {
                added += conform_kind(&mut field.kind, value);
            }
        }
    }

    added
}

fn add_parent_edges(graph: &mut Graph, report: &mut NormalizeReport) {
    let existing = graph.edge_keys();
    let mut implied = Vec::new();

    for node in &mut graph.nodes {
        let Some(parent) = node.parent.take() else {
            continue;
        };
        if parent == node.id {
            warn!(node_id = %node.id, "ignoring node that names itself as parent");
            continue;
        }

        let key = EdgeKey::new(&parent, &node.id);
        if existing.contains(&key) {
            continue;
        }
        warn!(source = %parent, target = %node.id, "adding edge implied by parent field");
        implied.push(Edge::new(key.to_string(), parent, node.id.clone()));
        report.implied_edges.push(key);
    }

    graph.edges.extend(implied);
}

fn dedupe_edges(graph: &mut Graph, report: &mut NormalizeReport) {
    let mut seen = HashSet::new();
    graph.edges.retain(|edge| {
        let key = edge.key();
        if seen.insert(key.clone()) {
            return true;
        }
        warn!(source = %edge.source, target = %edge.target, edge_id = %edge.id, "dropping duplicate edge");
        report.duplicate_edges.push(key);
        false
    });
}

fn drop_dangling_edges(graph: &mut Graph, report: &mut NormalizeReport) {
    let ids: HashSet<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();
    graph.edges.retain(|edge| {
        if ids.contains(&edge.source) && ids.contains(&edge.target) {
            return true;
        }
        warn!(source = %edge.source, target = %edge.target, edge_id = %edge.id, "dropping edge to a missing node");
        report.dangling_edges.push(edge.key());
        false
    });
}
