//! Graph algorithms over [`TrustGraph`].
//!
//! Everything here is deterministic for a given graph and runs without
//! recursion. The DFS-based algorithms (Tarjan SCC, articulation points)
//! use explicit stacks so deep or degenerate graphs cannot overflow the
//! call stack.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::graph::TrustGraph;

/// PageRank damping factor.
pub const PAGERANK_DAMPING: f64 = 0.85;
/// PageRank iteration cap.
pub const PAGERANK_MAX_ITER: usize = 100;
/// PageRank L1 convergence tolerance.
pub const PAGERANK_TOL: f64 = 1e-6;
/// Label propagation iteration cap.
pub const LABEL_PROP_MAX_ITER: usize = 50;

/// PageRank centrality by power iteration.
///
/// Dangling nodes redistribute their rank uniformly, so the ranks always
/// sum to 1.
pub fn pagerank(graph: &TrustGraph) -> BTreeMap<String, f64> {
    let agents: Vec<&str> = graph.agents().collect();
    let n = agents.len();
    if n == 0 {
        return BTreeMap::new();
    }

    let mut rank: HashMap<&str, f64> = agents.iter().map(|&a| (a, 1.0 / n as f64)).collect();

    for _ in 0..PAGERANK_MAX_ITER {
        let dangling_sum: f64 = agents
            .iter()
            .filter(|&&a| graph.out_degree(a) == 0)
            .map(|&a| rank[a])
            .sum();

        let mut new_rank: HashMap<&str, f64> = HashMap::with_capacity(n);
        for &agent in &agents {
            let incoming: f64 = graph
                .in_neighbors(agent)
                .map(|(src, _)| rank[src] / graph.out_degree(src) as f64)
                .sum();
            new_rank.insert(
                agent,
                (1.0 - PAGERANK_DAMPING) / n as f64
                    + PAGERANK_DAMPING * (incoming + dangling_sum / n as f64),
            );
        }

        let diff: f64 = agents.iter().map(|&a| (new_rank[a] - rank[a]).abs()).sum();
        rank = new_rank;
        if diff < PAGERANK_TOL {
            break;
        }
    }

    rank.into_iter().map(|(a, r)| (a.to_string(), r)).collect()
}

/// Brandes betweenness centrality on the directed graph, normalized by
/// `1 / ((n-1)(n-2))` when the graph has more than two nodes.
pub fn betweenness(graph: &TrustGraph) -> BTreeMap<String, f64> {
    let agents: Vec<&str> = graph.agents().collect();
    let mut centrality: HashMap<&str, f64> = agents.iter().map(|&a| (a, 0.0)).collect();

    for &source in &agents {
        let mut stack: Vec<&str> = Vec::new();
        let mut predecessors: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut sigma: HashMap<&str, f64> = agents.iter().map(|&a| (a, 0.0)).collect();
        sigma.insert(source, 1.0);
        let mut dist: HashMap<&str, i64> = agents.iter().map(|&a| (a, -1)).collect();
        dist.insert(source, 0);

        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(source);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for (w, _) in graph.out_neighbors(v) {
                if dist[w] < 0 {
                    dist.insert(w, dist[v] + 1);
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    *sigma.get_mut(w).expect("sigma initialized") += sigma[v];
                    predecessors.entry(w).or_default().push(v);
                }
            }
        }

        let mut delta: HashMap<&str, f64> = agents.iter().map(|&a| (a, 0.0)).collect();
        while let Some(w) = stack.pop() {
            if let Some(preds) = predecessors.get(w) {
                for &v in preds {
                    let share = (sigma[v] / sigma[w]) * (1.0 + delta[w]);
                    *delta.get_mut(v).expect("delta initialized") += share;
                }
            }
            if w != source {
                *centrality.get_mut(w).expect("centrality initialized") += delta[w];
            }
        }
    }

    let n = agents.len();
    let norm = if n > 2 {
        1.0 / ((n - 1) as f64 * (n - 2) as f64)
    } else {
        1.0
    };
    centrality
        .into_iter()
        .map(|(a, c)| (a.to_string(), c * norm))
        .collect()
}

/// Weakly connected components, largest first (ties broken by smallest
/// member id).
pub fn connected_components(graph: &TrustGraph) -> Vec<BTreeSet<String>> {
    let adj = graph.to_undirected();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut components: Vec<BTreeSet<String>> = Vec::new();

    for start in graph.agents() {
        if visited.contains(start) {
            continue;
        }
        let mut component: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(start);
        visited.insert(start);
        while let Some(node) = queue.pop_front() {
            component.insert(node.to_string());
            if let Some(neighbors) = adj.get(node) {
                for &neighbor in neighbors {
                    if visited.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }
        components.push(component);
    }

    components.sort_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then_with(|| a.iter().next().cmp(&b.iter().next()))
    });
    components
}

/// Strongly connected components via iterative Tarjan, largest first.
pub fn strongly_connected_components(graph: &TrustGraph) -> Vec<BTreeSet<String>> {
    struct Frame<'a> {
        node: &'a str,
        neighbors: Vec<&'a str>,
        next: usize,
    }

    let mut counter = 0usize;
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut lowlink: HashMap<&str, usize> = HashMap::new();
    let mut on_stack: HashSet<&str> = HashSet::new();
    let mut tarjan_stack: Vec<&str> = Vec::new();
    let mut sccs: Vec<BTreeSet<String>> = Vec::new();

    for start in graph.agents() {
        if index.contains_key(start) {
            continue;
        }

        index.insert(start, counter);
        lowlink.insert(start, counter);
        counter += 1;
        tarjan_stack.push(start);
        on_stack.insert(start);

        let mut call_stack: Vec<Frame> = vec![Frame {
            node: start,
            neighbors: graph.out_neighbors(start).map(|(w, _)| w).collect(),
            next: 0,
        }];

        loop {
            // Take one step with the frame borrow released before any
            // push or pop below.
            enum Step<'a> {
                Visit { v: &'a str, w: &'a str },
                Finish { v: &'a str },
                Done,
            }
            let step = match call_stack.last_mut() {
                None => Step::Done,
                Some(frame) => {
                    if frame.next < frame.neighbors.len() {
                        let w = frame.neighbors[frame.next];
                        frame.next += 1;
                        Step::Visit { v: frame.node, w }
                    } else {
                        Step::Finish { v: frame.node }
                    }
                }
            };

            match step {
                Step::Done => break,
                Step::Visit { v, w } => {
                    if !index.contains_key(w) {
                        index.insert(w, counter);
                        lowlink.insert(w, counter);
                        counter += 1;
                        tarjan_stack.push(w);
                        on_stack.insert(w);
                        call_stack.push(Frame {
                            node: w,
                            neighbors: graph.out_neighbors(w).map(|(x, _)| x).collect(),
                            next: 0,
                        });
                    } else if on_stack.contains(w) {
                        let candidate = index[w];
                        let low = lowlink.get_mut(v).expect("lowlink initialized");
                        *low = (*low).min(candidate);
                    }
                }
                Step::Finish { v } => {
                    call_stack.pop();

                    if let Some(parent) = call_stack.last() {
                        let child_low = lowlink[v];
                        let low = lowlink.get_mut(parent.node).expect("lowlink initialized");
                        *low = (*low).min(child_low);
                    }

                    if lowlink[v] == index[v] {
                        let mut scc: BTreeSet<String> = BTreeSet::new();
                        loop {
                            let w = tarjan_stack.pop().expect("tarjan stack underflow");
                            on_stack.remove(w);
                            scc.insert(w.to_string());
                            if w == v {
                                break;
                            }
                        }
                        sccs.push(scc);
                    }
                }
            }
        }
    }

    sccs.sort_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then_with(|| a.iter().next().cmp(&b.iter().next()))
    });
    sccs
}

/// BFS shortest-path hop counts from `source` over directed edges.
pub fn bfs_distances(graph: &TrustGraph, source: &str) -> BTreeMap<String, usize> {
    let mut dist: BTreeMap<String, usize> = BTreeMap::new();
    dist.insert(source.to_string(), 0);
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(source);
    while let Some(node) = queue.pop_front() {
        let d = dist[node];
        for (neighbor, _) in graph.out_neighbors(node) {
            if !dist.contains_key(neighbor) {
                dist.insert(neighbor.to_string(), d + 1);
                queue.push_back(neighbor);
            }
        }
    }
    dist
}

/// Diameter of the largest weakly connected component; -1 when the graph
/// is empty, 0 for a single node.
pub fn diameter(graph: &TrustGraph) -> i64 {
    let components = connected_components(graph);
    let largest = match components.first() {
        Some(largest) => largest,
        None => return -1,
    };
    if largest.len() < 2 {
        return 0;
    }

    let adj = graph.to_undirected();
    let mut max_dist: i64 = 0;
    for start in largest {
        let mut dist: HashMap<&str, i64> = HashMap::new();
        dist.insert(start.as_str(), 0);
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(start.as_str());
        while let Some(node) = queue.pop_front() {
            let d = dist[node];
            if let Some(neighbors) = adj.get(node) {
                for &neighbor in neighbors {
                    if !dist.contains_key(neighbor) && largest.contains(neighbor) {
                        dist.insert(neighbor, d + 1);
                        queue.push_back(neighbor);
                        max_dist = max_dist.max(d + 1);
                    }
                }
            }
        }
    }
    max_dist
}

/// Local clustering coefficient on the combined neighborhood (directed
/// links counted among in- and out-neighbors).
pub fn clustering_coefficient(graph: &TrustGraph, agent: &str) -> f64 {
    let mut neighbors: BTreeSet<&str> = graph.out_neighbors(agent).map(|(n, _)| n).collect();
    neighbors.extend(graph.in_neighbors(agent).map(|(n, _)| n));
    neighbors.remove(agent);
    let k = neighbors.len();
    if k < 2 {
        return 0.0;
    }

    let mut links = 0usize;
    for &u in &neighbors {
        for &v in &neighbors {
            if u != v && graph.has_edge(u, v) {
                links += 1;
            }
        }
    }
    links as f64 / (k * (k - 1)) as f64
}

/// Average clustering coefficient over all agents.
pub fn avg_clustering(graph: &TrustGraph) -> f64 {
    let agents: Vec<&str> = graph.agents().collect();
    if agents.is_empty() {
        return 0.0;
    }
    agents
        .iter()
        .map(|&a| clustering_coefficient(graph, a))
        .sum::<f64>()
        / agents.len() as f64
}

/// Articulation points of the undirected view: agents whose removal
/// increases the number of weakly connected components. Iterative DFS.
pub fn articulation_points(graph: &TrustGraph) -> BTreeSet<String> {
    struct Frame<'a> {
        node: &'a str,
        neighbors: Vec<&'a str>,
        next: usize,
    }

    fn neighbor_list<'a>(
        adj: &BTreeMap<&'a str, BTreeSet<&'a str>>,
        node: &str,
    ) -> Vec<&'a str> {
        adj.get(node).into_iter().flatten().copied().collect()
    }

    let adj = graph.to_undirected();
    let mut timer = 0usize;
    let mut disc: HashMap<&str, usize> = HashMap::new();
    let mut low: HashMap<&str, usize> = HashMap::new();
    let mut parent: HashMap<&str, Option<&str>> = HashMap::new();
    let mut points: BTreeSet<String> = BTreeSet::new();

    for root in graph.agents() {
        if disc.contains_key(root) {
            continue;
        }

        parent.insert(root, None);
        disc.insert(root, timer);
        low.insert(root, timer);
        timer += 1;
        let mut root_children = 0usize;

        let mut call_stack: Vec<Frame> = vec![Frame {
            node: root,
            neighbors: neighbor_list(&adj, root),
            next: 0,
        }];

        loop {
            enum Step<'a> {
                Visit { v: &'a str, w: &'a str },
                Finish { v: &'a str },
                Done,
            }
            let step = match call_stack.last_mut() {
                None => Step::Done,
                Some(frame) => {
                    if frame.next < frame.neighbors.len() {
                        let w = frame.neighbors[frame.next];
                        frame.next += 1;
                        Step::Visit { v: frame.node, w }
                    } else {
                        Step::Finish { v: frame.node }
                    }
                }
            };

            match step {
                Step::Done => break,
                Step::Visit { v, w } => {
                    if !disc.contains_key(w) {
                        if v == root {
                            root_children += 1;
                        }
                        parent.insert(w, Some(v));
                        disc.insert(w, timer);
                        low.insert(w, timer);
                        timer += 1;
                        call_stack.push(Frame {
                            node: w,
                            neighbors: neighbor_list(&adj, w),
                            next: 0,
                        });
                    } else if parent[v] != Some(w) {
                        let candidate = disc[w];
                        let entry = low.get_mut(v).expect("low initialized");
                        *entry = (*entry).min(candidate);
                    }
                }
                Step::Finish { v } => {
                    call_stack.pop();

                    if let Some(parent_frame) = call_stack.last() {
                        let p = parent_frame.node;
                        let child_low = low[v];
                        let entry = low.get_mut(p).expect("low initialized");
                        *entry = (*entry).min(child_low);

                        if p != root && child_low >= disc[p] {
                            points.insert(p.to_string());
                        }
                    }
                }
            }
        }

        if root_children > 1 {
            points.insert(root.to_string());
        }
    }

    points
}

/// Label propagation community detection.
///
/// Deterministic: agents are visited in sorted order and label ties break
/// to the minimum label. Stops when a full pass changes nothing or after
/// [`LABEL_PROP_MAX_ITER`] passes. Output labels are renumbered densely
/// from 0.
pub fn label_propagation(graph: &TrustGraph) -> BTreeMap<String, usize> {
    let adj = graph.to_undirected();
    let agents: Vec<&str> = graph.agents().collect();

    let mut labels: HashMap<&str, usize> =
        agents.iter().enumerate().map(|(i, &a)| (a, i)).collect();

    for _ in 0..LABEL_PROP_MAX_ITER {
        let mut changed = false;
        for &agent in &agents {
            let neighbors = match adj.get(agent) {
                Some(neighbors) if !neighbors.is_empty() => neighbors,
                _ => continue,
            };

            let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
            for &neighbor in neighbors {
                *counts.entry(labels[neighbor]).or_default() += 1;
            }
            let max_count = counts.values().copied().max().unwrap_or(0);
            let best = counts
                .iter()
                .filter(|(_, &count)| count == max_count)
                .map(|(&label, _)| label)
                .min()
                .expect("non-empty counts");

            if labels[agent] != best {
                labels.insert(agent, best);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    // Renumber densely from 0, ordered by raw label id.
    let unique: BTreeSet<usize> = labels.values().copied().collect();
    let remap: HashMap<usize, usize> = unique.into_iter().enumerate().map(|(n, l)| (l, n)).collect();
    labels
        .into_iter()
        .map(|(agent, label)| (agent.to_string(), remap[&label]))
        .collect()
}

/// Communities as agent sets, largest first.
pub fn communities(graph: &TrustGraph) -> Vec<BTreeSet<String>> {
    let labels = label_propagation(graph);
    let mut groups: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
    for (agent, label) in labels {
        groups.entry(label).or_default().insert(agent);
    }
    let mut result: Vec<BTreeSet<String>> = groups.into_values().collect();
    result.sort_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then_with(|| a.iter().next().cmp(&b.iter().next()))
    });
    result
}

/// Graph density: edges over possible directed edges.
pub fn density(graph: &TrustGraph) -> f64 {
    let n = graph.num_agents();
    if n < 2 {
        return 0.0;
    }
    graph.num_edges() as f64 / (n * (n - 1)) as f64
}

/// Fraction of edges that are reciprocated.
pub fn reciprocity(graph: &TrustGraph) -> f64 {
    let edges = graph.num_edges();
    if edges == 0 {
        return 0.0;
    }
    let mut mutual = 0usize;
    for src in graph.agents() {
        for (dst, _) in graph.out_neighbors(src) {
            if graph.has_edge(dst, src) {
                mutual += 1;
            }
        }
    }
    mutual as f64 / edges as f64
}

/// Sybil likelihood per agent in [0, 1] from structural signals:
/// degree imbalance, low clustering, low PageRank relative to degree,
/// absence of seed endorsement, and a single dominating in-neighbor.
pub fn sybil_scores(
    graph: &TrustGraph,
    seed_agents: Option<&BTreeSet<String>>,
) -> BTreeMap<String, f64> {
    let agents: Vec<&str> = graph.agents().collect();
    if agents.is_empty() {
        return BTreeMap::new();
    }

    let pr = pagerank(graph);
    let max_pr = pr.values().fold(0.0_f64, |acc, &r| acc.max(r)).max(f64::MIN_POSITIVE);

    let mut scores: BTreeMap<String, f64> = BTreeMap::new();
    for &agent in &agents {
        let in_deg = graph.in_degree(agent);
        let out_deg = graph.out_degree(agent);
        let total = in_deg + out_deg;
        let mut score = 0.0;

        // Many given, few received (or the reverse) reads as spray.
        if total > 0 {
            score += (out_deg as f64 - in_deg as f64).abs() / total as f64 * 0.3;
        }

        // Connected but embedded in no triangles.
        let cc = clustering_coefficient(graph, agent);
        if total >= 4 && cc < 0.1 {
            score += 0.3;
        } else if total >= 2 && cc < 0.05 {
            score += 0.2;
        }

        // Degree without influence.
        if total > 2 && pr.get(agent).copied().unwrap_or(0.0) / max_pr < 0.01 {
            score += 0.2;
        }

        // Nobody trusted by the seed set vouches for it.
        if let Some(seeds) = seed_agents {
            let endorsed = graph.in_neighbors(agent).any(|(src, _)| seeds.contains(src));
            if !endorsed {
                score += 0.3;
            }
        }

        // A single account manufacturing its reputation.
        if in_deg > 3 && graph.in_neighbors(agent).map(|(src, _)| src).collect::<BTreeSet<_>>().len() == 1
        {
            score += 0.4;
        }

        scores.insert(agent.to_string(), score.min(1.0));
    }

    scores
}
