//! Per-agent metrics and aggregate network statistics.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::algorithms;
use crate::graph::TrustGraph;

/// Full analytics for a single agent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentMetrics {
    pub agent_id: String,
    /// Attestations received.
    pub in_degree: usize,
    /// Attestations given.
    pub out_degree: usize,
    pub betweenness: f64,
    pub pagerank: f64,
    pub clustering_coeff: f64,
    pub community: Option<usize>,
    pub is_bridge: bool,
    /// 0 = clean, 1 = likely sybil.
    pub sybil_score: f64,
    /// Fraction of mutual attestations among this agent's connections.
    pub reciprocity: f64,
    pub avg_trust_given: f64,
    pub avg_trust_received: f64,
}

/// Aggregate network statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkStats {
    pub num_agents: usize,
    pub num_edges: usize,
    pub density: f64,
    pub avg_degree: f64,
    pub num_components: usize,
    pub largest_component_size: usize,
    pub num_communities: usize,
    pub avg_clustering: f64,
    /// -1 when the graph is empty.
    pub diameter: i64,
    pub reciprocity: f64,
}

/// Facade over the algorithm suite for one graph.
pub struct TrustAnalytics<'g> {
    graph: &'g TrustGraph,
}

impl<'g> TrustAnalytics<'g> {
    pub fn new(graph: &'g TrustGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &TrustGraph {
        self.graph
    }

    pub fn pagerank(&self) -> BTreeMap<String, f64> {
        algorithms::pagerank(self.graph)
    }

    pub fn betweenness(&self) -> BTreeMap<String, f64> {
        algorithms::betweenness(self.graph)
    }

    pub fn connected_components(&self) -> Vec<BTreeSet<String>> {
        algorithms::connected_components(self.graph)
    }

    pub fn strongly_connected_components(&self) -> Vec<BTreeSet<String>> {
        algorithms::strongly_connected_components(self.graph)
    }

    pub fn communities(&self) -> Vec<BTreeSet<String>> {
        algorithms::communities(self.graph)
    }

    pub fn label_propagation(&self) -> BTreeMap<String, usize> {
        algorithms::label_propagation(self.graph)
    }

    pub fn bridges(&self) -> BTreeSet<String> {
        algorithms::articulation_points(self.graph)
    }

    pub fn sybil_scores(&self, seeds: Option<&BTreeSet<String>>) -> BTreeMap<String, f64> {
        algorithms::sybil_scores(self.graph, seeds)
    }

    pub fn diameter(&self) -> i64 {
        algorithms::diameter(self.graph)
    }

    /// Full analytics for one agent. Runs the whole-graph passes once.
    pub fn agent_metrics(
        &self,
        agent: &str,
        seeds: Option<&BTreeSet<String>>,
    ) -> AgentMetrics {
        let pagerank = self.pagerank();
        let betweenness = self.betweenness();
        let sybil = self.sybil_scores(seeds);
        let communities = self.label_propagation();
        let bridges = self.bridges();

        let out: Vec<(String, f64)> = self
            .graph
            .out_neighbors(agent)
            .map(|(n, w)| (n.to_string(), w))
            .collect();
        let inc: Vec<(String, f64)> = self
            .graph
            .in_neighbors(agent)
            .map(|(n, w)| (n.to_string(), w))
            .collect();

        let mutual = out
            .iter()
            .filter(|(dst, _)| self.graph.has_edge(dst, agent))
            .count();
        let connections: BTreeSet<&str> = out
            .iter()
            .map(|(n, _)| n.as_str())
            .chain(inc.iter().map(|(n, _)| n.as_str()))
            .collect();

        AgentMetrics {
            agent_id: agent.to_string(),
            in_degree: self.graph.in_degree(agent),
            out_degree: self.graph.out_degree(agent),
            betweenness: betweenness.get(agent).copied().unwrap_or(0.0),
            pagerank: pagerank.get(agent).copied().unwrap_or(0.0),
            clustering_coeff: algorithms::clustering_coefficient(self.graph, agent),
            community: communities.get(agent).copied(),
            is_bridge: bridges.contains(agent),
            sybil_score: sybil.get(agent).copied().unwrap_or(0.0),
            reciprocity: if connections.is_empty() {
                0.0
            } else {
                mutual as f64 / connections.len() as f64
            },
            avg_trust_given: if out.is_empty() {
                0.0
            } else {
                out.iter().map(|(_, w)| w).sum::<f64>() / out.len() as f64
            },
            avg_trust_received: if inc.is_empty() {
                0.0
            } else {
                inc.iter().map(|(_, w)| w).sum::<f64>() / inc.len() as f64
            },
        }
    }

    /// Aggregate statistics for the whole network.
    pub fn network_stats(&self) -> NetworkStats {
        let n = self.graph.num_agents();
        let e = self.graph.num_edges();
        let components = self.connected_components();
        let communities = self.communities();

        NetworkStats {
            num_agents: n,
            num_edges: e,
            density: algorithms::density(self.graph),
            avg_degree: if n > 0 { e as f64 / n as f64 } else { 0.0 },
            num_components: components.len(),
            largest_component_size: components.first().map(BTreeSet::len).unwrap_or(0),
            num_communities: communities.len(),
            avg_clustering: algorithms::avg_clustering(self.graph),
            diameter: self.diameter(),
            reciprocity: algorithms::reciprocity(self.graph),
        }
    }
}
