//! Node search for the sidebar.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use crate::graph::types::NetworkNode;

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub ip_addr: String,
    pub label: String,
    pub score: i64,
}

pub trait NodeSearch {
    /// Up to `limit` hits for `query`, best first. A blank query matches nothing.
    fn search(&self, nodes: &[NetworkNode], query: &str, limit: usize) -> Vec<SearchHit>;
}

/// Skim-style fuzzy matching over name, address and domains.
#[derive(Default)]
pub struct FuzzySearch {
    matcher: SkimMatcherV2,
}

impl FuzzySearch {
    /// Best score of `query` against any searchable field of `node`
    fn score(&self, node: &NetworkNode, query: &str) -> Option<i64> {
        std::iter::once(node.ip_addr.as_str())
            .chain(node.name.as_deref())
            .chain(node.domains.iter().map(String::as_str))
            .filter_map(|text| fuzzy_match_score(&self.matcher, text, query))
            .max()
    }
}

impl NodeSearch for FuzzySearch {
    fn search(&self, nodes: &[NetworkNode], query: &str, limit: usize) -> Vec<SearchHit> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = nodes
            .iter()
            .filter(|node| !node.ip_addr.trim().is_empty())
            .filter_map(|node| {
                let score = self.score(node, query)?;
                let label = match &node.name {
                    Some(name) if node.has_name() => format!("{} ({})", name, node.ip_addr),
                    _ => node.ip_addr.clone(),
                };
                Some(SearchHit {
                    ip_addr: node.ip_addr.clone(),
                    label,
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.ip_addr.cmp(&b.ip_addr)));
        hits.dedup_by(|a, b| a.ip_addr == b.ip_addr);
        hits.truncate(limit);
        hits
    }
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> Vec<NetworkNode> {
        vec![
            NetworkNode::new("10.0.0.1").with_name("core-router"),
            NetworkNode::new("10.0.0.2").with_domains(["mail.example.org"]),
            NetworkNode::new("192.168.1.7"),
        ]
    }

    #[test]
    fn test_matches_name_domain_and_address() {
        let search = FuzzySearch::default();
        let nodes = nodes();

        let hits = search.search(&nodes, "router", 10);
        assert_eq!(hits[0].ip_addr, "10.0.0.1");
        assert_eq!(hits[0].label, "core-router (10.0.0.1)");

        let hits = search.search(&nodes, "MAIL", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ip_addr, "10.0.0.2");

        let hits = search.search(&nodes, "192.168", 10);
        assert_eq!(hits[0].ip_addr, "192.168.1.7");
    }

    #[test]
    fn test_blank_query_and_limit() {
        let search = FuzzySearch::default();
        let nodes = nodes();
        assert!(search.search(&nodes, "   ", 10).is_empty());

        let hits = search.search(&nodes, "10.0", 1);
        assert_eq!(hits.len(), 1);
    }
}
