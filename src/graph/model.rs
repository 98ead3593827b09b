//! Graph model builder: raw topology records to vertices and edges.

use std::collections::HashMap;

use super::types::{GraphEdge, GraphVertex, Group, NetworkNode};

/// Radius growth per declared neighbour, as a fraction of the base radius
const RADIUS_GROWTH_PER_NEIGHBOR: f32 = 1.0 / 20.0;
/// Hubs never grow beyond this multiple of their base radius
const MAX_RADIUS_FACTOR: f32 = 2.0;
/// Unnamed hosts are drawn slightly smaller than named ones
const UNNAMED_SCALE: f32 = 0.8;

/// Vertices and edges for one topology snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphModel {
    pub vertices: Vec<GraphVertex>,
    pub edges: Vec<GraphEdge>,
    index: HashMap<String, usize>,
}

impl GraphModel {
    /// Build the model for a snapshot. Pure and deterministic.
    ///
    /// Records without an `ip_addr` are skipped, and a repeated `ip_addr`
    /// keeps its first record. Neighbour references to hosts missing from the
    /// snapshot produce no edge. Mutual neighbours produce two edges.
    pub fn build(nodes: &[NetworkNode], node_size: f32) -> Self {
        let mut vertices = Vec::with_capacity(nodes.len());
        let mut index = HashMap::with_capacity(nodes.len());

        for node in nodes {
            let id = node.ip_addr.trim();
            if id.is_empty() || index.contains_key(id) {
                continue;
            }

            let group = if node.has_name() {
                Group::Named
            } else {
                Group::Unnamed
            };
            let display_name = match &node.name {
                Some(name) if node.has_name() => name.clone(),
                _ => id.to_string(),
            };

            index.insert(id.to_string(), vertices.len());
            vertices.push(GraphVertex {
                id: id.to_string(),
                display_name,
                domains: node.domains.clone(),
                neighbor_ids: node.neighbours.clone(),
                group,
                radius: vertex_radius(group, node.neighbours.len(), node_size),
            });
        }

        let mut edges = Vec::new();
        for (source, vertex) in vertices.iter().enumerate() {
            for neighbor_id in &vertex.neighbor_ids {
                if let Some(&target) = index.get(neighbor_id.trim()) {
                    edges.push(GraphEdge {
                        source_id: vertex.id.clone(),
                        target_id: vertices[target].id.clone(),
                        source,
                        target,
                    });
                }
            }
        }

        Self {
            vertices,
            edges,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn vertex(&self, id: &str) -> Option<&GraphVertex> {
        self.index_of(id).map(|i| &self.vertices[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Indices of the vertex's declared neighbours that exist in this model.
    pub fn neighbor_indices(&self, index: usize) -> Vec<usize> {
        self.vertices
            .get(index)
            .map(|vertex| {
                vertex
                    .neighbor_ids
                    .iter()
                    .filter_map(|id| self.index_of(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Indices into `edges` of every edge touching the vertex.
    pub fn incident_edges(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(move |(_, edge)| edge.touches(index))
            .map(|(i, _)| i)
    }

    /// Re-derive every radius for a new base node size, keeping vertices and
    /// edges in place.
    pub fn resize_vertices(&mut self, node_size: f32) {
        for vertex in &mut self.vertices {
            vertex.radius = vertex_radius(vertex.group, vertex.neighbor_ids.len(), node_size);
        }
    }

    pub fn radii(&self) -> Vec<f32> {
        self.vertices.iter().map(|v| v.radius).collect()
    }
}

/// Radius of a vertex: named hosts start at `node_size`, unnamed at 80% of it,
/// growing 5% per declared neighbour up to twice the base.
pub fn vertex_radius(group: Group, neighbor_count: usize, node_size: f32) -> f32 {
    let base = match group {
        Group::Named => node_size,
        Group::Unnamed => node_size * UNNAMED_SCALE,
    };
    let factor = (1.0 + neighbor_count as f32 * RADIUS_GROWTH_PER_NEIGHBOR).min(MAX_RADIUS_FACTOR);
    base * factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn scenario() -> Vec<NetworkNode> {
        vec![
            NetworkNode::new("10.0.0.1")
                .with_name("core")
                .with_neighbours(["10.0.0.2"]),
            NetworkNode::new("10.0.0.2").with_neighbours(["10.0.0.1", "10.0.0.9"]),
        ]
    }

    #[test]
    fn test_scenario_drops_unknown_neighbour() {
        let model = GraphModel::build(&scenario(), 8.0);
        let pairs: Vec<(&str, &str)> = model
            .edges
            .iter()
            .map(|e| (e.source_id.as_str(), e.target_id.as_str()))
            .collect();

        assert!(pairs.contains(&("10.0.0.1", "10.0.0.2")));
        assert!(pairs.contains(&("10.0.0.2", "10.0.0.1")));
        assert_eq!(pairs.len(), 2);
        assert!(model.edges.iter().all(|e| e.target_id != "10.0.0.9"));
    }

    #[test]
    fn test_ids_unique_and_no_dangling_edges() {
        let mut nodes = scenario();
        nodes.push(NetworkNode::new("10.0.0.1").with_name("duplicate"));
        nodes.push(NetworkNode::new(""));
        nodes.push(NetworkNode::new("10.0.0.3").with_neighbours(["10.0.0.3", "10.0.0.4"]));

        let model = GraphModel::build(&nodes, 8.0);
        let ids: HashSet<&str> = model.vertices.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids.len(), model.vertices.len());
        assert_eq!(ids, HashSet::from(["10.0.0.1", "10.0.0.2", "10.0.0.3"]));
        assert_eq!(model.vertex("10.0.0.1").unwrap().display_name, "core");

        for edge in &model.edges {
            assert!(ids.contains(edge.source_id.as_str()));
            assert!(ids.contains(edge.target_id.as_str()));
            assert_eq!(model.vertices[edge.source].id, edge.source_id);
            assert_eq!(model.vertices[edge.target].id, edge.target_id);
        }
    }

    #[test]
    fn test_radius_grows_with_neighbours_and_caps() {
        assert_eq!(vertex_radius(Group::Named, 0, 10.0), 10.0);
        assert_eq!(vertex_radius(Group::Named, 100, 10.0), 20.0);
        assert_eq!(vertex_radius(Group::Unnamed, 0, 10.0), 8.0);
        assert_eq!(vertex_radius(Group::Unnamed, 100, 10.0), 16.0);

        let mut previous = 0.0;
        for count in 0..60 {
            let radius = vertex_radius(Group::Named, count, 10.0);
            assert!(radius >= previous);
            assert!(radius <= 20.0);
            previous = radius;
        }
    }

    #[test]
    fn test_build_is_idempotent() {
        let nodes = scenario();
        assert_eq!(GraphModel::build(&nodes, 8.0), GraphModel::build(&nodes, 8.0));
    }

    #[test]
    fn test_empty_input() {
        let model = GraphModel::build(&[], 8.0);
        assert!(model.vertices.is_empty());
        assert!(model.edges.is_empty());
        assert!(model.neighbor_indices(0).is_empty());
    }

    #[test]
    fn test_resize_keeps_structure() {
        let mut model = GraphModel::build(&scenario(), 8.0);
        let edges = model.edges.clone();
        model.resize_vertices(16.0);
        assert_eq!(model.edges, edges);
        assert!((model.vertex("10.0.0.1").unwrap().radius - 16.8).abs() < 1e-4);
    }

    #[test]
    fn test_incident_edges_and_neighbours() {
        let model = GraphModel::build(&scenario(), 8.0);
        let core = model.index_of("10.0.0.1").unwrap();
        assert_eq!(model.incident_edges(core).count(), 2);
        assert_eq!(model.neighbor_indices(1), vec![core]);
    }
}
