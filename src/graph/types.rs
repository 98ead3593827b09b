//! Graph data types matching the topology API response.

use serde::{Deserialize, Deserializer};

/// A host record as delivered by the topology backend.
///
/// Only `ip_addr` is meaningful as an identifier; every other field is
/// optional on the wire and defaults to absent/empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NetworkNode {
    #[serde(default)]
    pub ip_addr: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub domains: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub neighbours: Vec<String>,
}

impl NetworkNode {
    pub fn new(ip_addr: impl Into<String>) -> Self {
        Self {
            ip_addr: ip_addr.into(),
            ..Default::default()
        }
    }

    /// A blank name counts as no name.
    pub fn has_name(&self) -> bool {
        self.name.as_deref().is_some_and(|name| !name.trim().is_empty())
    }
}

#[cfg(test)]
impl NetworkNode {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_neighbours<I, S>(mut self, neighbours: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.neighbours = neighbours.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains = domains.into_iter().map(Into::into).collect();
        self
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Visual category of a vertex; drives its fill color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Named,
    Unnamed,
}

impl Group {
    pub fn label(&self) -> &'static str {
        match self {
            Group::Named => "Named host",
            Group::Unnamed => "Unnamed host",
        }
    }
}

/// A simulation-ready vertex derived from a [`NetworkNode`].
///
/// Physical state (position, velocity, pin) is not stored here; it lives in
/// the force simulation, indexed by the vertex's position in the model.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphVertex {
    pub id: String,
    pub display_name: String,
    pub domains: Vec<String>,
    pub neighbor_ids: Vec<String>,
    pub group: Group,
    pub radius: f32,
}

/// A directed edge between two vertices of the same model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub source_id: String,
    pub target_id: String,
    /// Index of the source vertex in the model
    pub source: usize,
    /// Index of the target vertex in the model
    pub target: usize,
}

impl GraphEdge {
    pub fn touches(&self, index: usize) -> bool {
        self.source == index || self.target == index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_node() {
        let json = r#"{"ip_addr":"10.0.0.1","name":"core","domains":["core.lan"],"neighbours":["10.0.0.2"]}"#;
        let node: NetworkNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.ip_addr, "10.0.0.1");
        assert_eq!(node.name.as_deref(), Some("core"));
        assert_eq!(node.domains, vec!["core.lan".to_string()]);
        assert_eq!(node.neighbours, vec!["10.0.0.2".to_string()]);
    }

    #[test]
    fn test_parse_missing_and_null_fields() {
        let json = r#"{"ip_addr":"10.0.0.2","domains":null}"#;
        let node: NetworkNode = serde_json::from_str(json).unwrap();
        assert!(node.name.is_none());
        assert!(node.domains.is_empty());
        assert!(node.neighbours.is_empty());

        let node: NetworkNode = serde_json::from_str("{}").unwrap();
        assert!(node.ip_addr.is_empty());
    }

    #[test]
    fn test_blank_name_is_unnamed() {
        assert!(!NetworkNode::new("10.0.0.3").with_name("  ").has_name());
        assert!(NetworkNode::new("10.0.0.3").with_name("edge").has_name());
    }
}
