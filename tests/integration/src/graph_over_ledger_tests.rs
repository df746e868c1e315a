//! Analytics over a graph built from ledger attestations.

use crate::test_utils::{attest, triangle};
use isnad_analytics::{algorithms, TrustAnalytics, TrustGraph};
use isnad_identity::Identity;
use isnad_ledger::TrustLedger;

/// Witness -> subject edges from the ledger's attestation list.
fn graph_from(ledger: &TrustLedger) -> TrustGraph {
    let mut graph = TrustGraph::new();
    for attestation in ledger.attestations() {
        graph.add_edge(&attestation.witness, &attestation.subject, 1.0);
    }
    graph
}

#[test]
fn pagerank_over_triangle_sums_to_one() {
    let (ledger, _, _, _) = triangle();
    let graph = graph_from(&ledger);

    let pagerank = algorithms::pagerank(&graph);
    let total: f64 = pagerank.values().sum();
    assert!((total - 1.0).abs() < 0.01);
    assert_eq!(pagerank.len(), 3);
}

#[test]
fn label_propagation_reproducible_over_ledger() {
    let (ledger, _, _, _) = triangle();
    let graph = graph_from(&ledger);

    assert_eq!(
        algorithms::label_propagation(&graph),
        algorithms::label_propagation(&graph)
    );
}

#[test]
fn hub_witness_dominates_betweenness() {
    let mut ledger = TrustLedger::in_memory();
    let hub = Identity::generate();
    let upstream = Identity::generate();

    // upstream -> hub -> five subjects: the hub sits on every path.
    ledger.add(attest(&upstream, &hub.agent_id(), "vouch")).unwrap();
    for i in 0..5 {
        let subject = Identity::generate();
        ledger
            .add(attest(&hub, &subject.agent_id(), &format!("task-{}", i)))
            .unwrap();
    }

    let graph = graph_from(&ledger);
    let betweenness = algorithms::betweenness(&graph);
    let hub_score = betweenness[&hub.agent_id()];
    assert!(betweenness
        .iter()
        .all(|(agent, score)| agent == &hub.agent_id() || *score <= hub_score));
}

#[test]
fn network_stats_track_ledger_shape() {
    let (ledger, _, _, _) = triangle();
    let graph = graph_from(&ledger);
    let analytics = TrustAnalytics::new(&graph);

    let stats = analytics.network_stats();
    assert_eq!(stats.num_agents, 3);
    assert_eq!(stats.num_edges, 3);
    assert_eq!(stats.num_components, 1);
    assert_eq!(stats.diameter, 1);
}

#[test]
fn sybil_heuristics_flag_fabricated_cluster() {
    let mut ledger = TrustLedger::in_memory();

    // Organic core: mutual attestations among three agents.
    let core: Vec<Identity> = (0..3).map(|_| Identity::generate()).collect();
    for i in 0..3 {
        for j in 0..3 {
            if i != j {
                ledger
                    .add(attest(&core[i], &core[j].agent_id(), "peer-review"))
                    .unwrap();
            }
        }
    }

    // A puppeteer inflating one target through sock puppets.
    let puppeteer = Identity::generate();
    let target = Identity::generate();
    for i in 0..4 {
        let sock = Identity::generate();
        ledger.add(attest(&puppeteer, &sock.agent_id(), "boost")).unwrap();
        ledger
            .add(attest(&sock, &target.agent_id(), &format!("fake-{}", i)))
            .unwrap();
    }

    let graph = graph_from(&ledger);
    let seeds: std::collections::BTreeSet<String> =
        core.iter().map(|c| c.agent_id()).collect();
    let scores = algorithms::sybil_scores(&graph, Some(&seeds));

    let core_score = scores[&core[0].agent_id()];
    let target_score = scores[&target.agent_id()];
    assert!(
        target_score > core_score,
        "target {} should outscore organic {}",
        target_score,
        core_score
    );
}
