//! Trust network analytics
//!
//! Directed-graph analysis over the attestation graph: centrality,
//! components, communities, clustering, bridge detection, and sybil
//! heuristics. All algorithms are deterministic given the same input graph
//! and are implemented iteratively — no recursion — so graphs with tens of
//! thousands of nodes don't exhaust the stack.

pub mod algorithms;
pub mod graph;
pub mod metrics;

pub use graph::TrustGraph;
pub use metrics::{AgentMetrics, NetworkStats, TrustAnalytics};
