//! Directed weighted graph over agent ids.
//!
//! Nodes are agents, edges are attestations (witness -> subject) carrying a
//! weight, 1.0 by default. Both adjacency directions are kept so in- and
//! out-neighbor queries are O(1).

use std::collections::{BTreeMap, BTreeSet};

/// Lightweight directed graph for trust network analysis.
///
/// BTree-backed adjacency keeps every iteration order deterministic, which
/// the community and sybil algorithms rely on for reproducible output.
#[derive(Debug, Clone, Default)]
pub struct TrustGraph {
    out: BTreeMap<String, BTreeMap<String, f64>>,
    inc: BTreeMap<String, BTreeMap<String, f64>>,
    agents: BTreeSet<String>,
}

impl TrustGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_agent(&mut self, agent_id: &str) {
        self.agents.insert(agent_id.to_string());
    }

    /// Add a trust edge (attestation) from `src` to `dst`. Re-adding an
    /// edge overwrites its weight.
    pub fn add_edge(&mut self, src: &str, dst: &str, weight: f64) {
        self.agents.insert(src.to_string());
        self.agents.insert(dst.to_string());
        self.out
            .entry(src.to_string())
            .or_default()
            .insert(dst.to_string(), weight);
        self.inc
            .entry(dst.to_string())
            .or_default()
            .insert(src.to_string(), weight);
    }

    pub fn remove_edge(&mut self, src: &str, dst: &str) {
        if let Some(targets) = self.out.get_mut(src) {
            targets.remove(dst);
        }
        if let Some(sources) = self.inc.get_mut(dst) {
            sources.remove(src);
        }
    }

    /// All agents in sorted order.
    pub fn agents(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(String::as_str)
    }

    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn num_edges(&self) -> usize {
        self.out.values().map(BTreeMap::len).sum()
    }

    pub fn out_neighbors(&self, agent: &str) -> impl Iterator<Item = (&str, f64)> {
        self.out
            .get(agent)
            .into_iter()
            .flat_map(|targets| targets.iter().map(|(dst, w)| (dst.as_str(), *w)))
    }

    pub fn in_neighbors(&self, agent: &str) -> impl Iterator<Item = (&str, f64)> {
        self.inc
            .get(agent)
            .into_iter()
            .flat_map(|sources| sources.iter().map(|(src, w)| (src.as_str(), *w)))
    }

    pub fn out_degree(&self, agent: &str) -> usize {
        self.out.get(agent).map(BTreeMap::len).unwrap_or(0)
    }

    pub fn in_degree(&self, agent: &str) -> usize {
        self.inc.get(agent).map(BTreeMap::len).unwrap_or(0)
    }

    pub fn has_edge(&self, src: &str, dst: &str) -> bool {
        self.out
            .get(src)
            .map(|targets| targets.contains_key(dst))
            .unwrap_or(false)
    }

    pub fn edge_weight(&self, src: &str, dst: &str) -> Option<f64> {
        self.out.get(src).and_then(|targets| targets.get(dst)).copied()
    }

    /// Undirected adjacency view, used by components, clustering, and
    /// community detection.
    pub fn to_undirected(&self) -> BTreeMap<&str, BTreeSet<&str>> {
        let mut adj: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for agent in &self.agents {
            adj.entry(agent.as_str()).or_default();
        }
        for (src, targets) in &self.out {
            for dst in targets.keys() {
                adj.entry(src.as_str()).or_default().insert(dst.as_str());
                adj.entry(dst.as_str()).or_default().insert(src.as_str());
            }
        }
        adj
    }
}
