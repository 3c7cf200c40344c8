//! Breadth-first wave decomposition.
//!
//! A wave is the set of edges leaving one BFS frontier. Edges inside a wave are animated
//! together; consecutive waves are animated one after another.

use crate::graph::Graph;
use crate::ir::NodeId;
use std::collections::HashSet;

pub type Wave<P> = Vec<P>;

/// Edge waves reachable from `start`.
///
/// Every node is expanded at most once. Edges that lead to an already visited node are still
/// part of the wave that discovers them, so converging paths are drawn in full. A `start` that
/// is not in the graph yields no waves.
pub fn decompose<P: Clone>(graph: &Graph<P>, start: &str) -> Vec<Wave<P>> {
    let mut waves = Vec::new();
    if !graph.contains(start) {
        return waves;
    }

    let mut visited: HashSet<NodeId> = HashSet::from([start.to_string()]);
    let mut frontier: Vec<NodeId> = vec![start.to_string()];

    while !frontier.is_empty() {
        let mut wave = Vec::new();
        let mut next = Vec::new();
        for node in &frontier {
            for edge in graph.outgoing_edges(node) {
                wave.push(edge.primitive.clone());
                if visited.insert(edge.to.clone()) {
                    next.push(edge.to.clone());
                }
            }
        }
        if wave.is_empty() {
            break;
        }
        waves.push(wave);
        frontier = next;
    }

    waves
}

/// Node layers reachable from `start`, excluding `start` itself.
pub fn decompose_nodes<P>(graph: &Graph<P>, start: &str) -> Vec<Vec<NodeId>> {
    let mut layers = Vec::new();
    if !graph.contains(start) {
        return layers;
    }

    let mut visited: HashSet<&str> = HashSet::from([start]);
    let mut frontier: Vec<&str> = vec![start];

    while !frontier.is_empty() {
        let mut next: Vec<&str> = Vec::new();
        for node in &frontier {
            for succ in graph.successors(node) {
                if visited.insert(succ.as_str()) {
                    next.push(succ.as_str());
                }
            }
        }
        if !next.is_empty() {
            layers.push(next.iter().map(|node| node.to_string()).collect());
        }
        frontier = next;
    }

    layers
}

/// One wave sequence per root, in root order.
pub fn decompose_roots<P: Clone>(graph: &Graph<P>, roots: &[NodeId]) -> Vec<(NodeId, Vec<Wave<P>>)> {
    roots
        .iter()
        .map(|root| (root.clone(), decompose(graph, root)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::RawEdge;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeSet;

    fn named(pairs: &[(&str, &str)]) -> Graph<String> {
        Graph::build(
            pairs
                .iter()
                .map(|(from, to)| RawEdge::new(*from, *to, format!("{from}->{to}"))),
        )
    }

    #[test]
    fn diamond_splits_into_two_waves() {
        let g = named(&[("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")]);
        let waves = decompose(&g, "A");
        assert_eq!(
            waves,
            vec![
                vec!["A->B".to_string(), "A->C".to_string()],
                vec!["B->D".to_string(), "C->D".to_string()],
            ]
        );
    }

    #[test]
    fn chain_yields_one_edge_per_wave() {
        let g = named(&[("A", "B"), ("B", "C"), ("C", "D")]);
        let waves = decompose(&g, "A");
        assert_eq!(waves.len(), 3);
        assert!(waves.iter().all(|wave| wave.len() == 1));
    }

    #[test]
    fn cycle_terminates_and_keeps_back_edge() {
        let g = named(&[("A", "B"), ("B", "C"), ("C", "A")]);
        let waves = decompose(&g, "A");
        assert_eq!(
            waves,
            vec![
                vec!["A->B".to_string()],
                vec!["B->C".to_string()],
                vec!["C->A".to_string()],
            ]
        );
    }

    #[test]
    fn self_loop_is_drawn_once() {
        let g = named(&[("A", "A"), ("A", "B")]);
        let waves = decompose(&g, "A");
        assert_eq!(waves, vec![vec!["A->A".to_string(), "A->B".to_string()]]);
    }

    #[test]
    fn unknown_start_yields_nothing() {
        let g = named(&[("A", "B")]);
        assert!(decompose(&g, "Z").is_empty());
        assert!(decompose_nodes(&g, "Z").is_empty());
    }

    #[test]
    fn empty_graph_yields_nothing() {
        let g: Graph<String> = Graph::default();
        assert!(decompose(&g, "A").is_empty());
    }

    #[test]
    fn sink_start_has_no_trailing_empty_wave() {
        let g = named(&[("A", "B")]);
        assert!(decompose(&g, "B").is_empty());
    }

    #[test]
    fn node_layers_follow_bfs_depth() {
        let g = named(&[("A", "B"), ("A", "C"), ("B", "D"), ("C", "D"), ("D", "E")]);
        let layers = decompose_nodes(&g, "A");
        assert_eq!(
            layers,
            vec![
                vec!["B".to_string(), "C".to_string()],
                vec!["D".to_string()],
                vec!["E".to_string()],
            ]
        );
    }

    #[test]
    fn roots_decompose_independently() {
        let g = named(&[("A", "C"), ("B", "C"), ("C", "D")]);
        let per_root = decompose_roots(&g, &g.roots());
        assert_eq!(per_root.len(), 2);
        assert_eq!(per_root[0].0, "A");
        assert_eq!(per_root[1].0, "B");
        assert_eq!(per_root[0].1.len(), 2);
    }

    fn reachable(g: &Graph<usize>, start: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::from([start.to_string()]);
        let mut stack = vec![start.to_string()];
        while let Some(node) = stack.pop() {
            for succ in g.successors(&node) {
                if seen.insert(succ.clone()) {
                    stack.push(succ.clone());
                }
            }
        }
        seen
    }

    #[test]
    fn random_dags_cover_exactly_the_reachable_edges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..64 {
            let count = rng.random_range(2..12usize);
            let mut edges = Vec::new();
            for from in 0..count {
                for to in (from + 1)..count {
                    if rng.random_bool(0.3) {
                        edges.push(RawEdge::new(format!("n{from}"), format!("n{to}"), edges.len()));
                    }
                }
            }
            let g = Graph::build(edges);
            for root in g.roots() {
                let waves = decompose(&g, &root);
                let drawn: Vec<usize> = waves.iter().flatten().copied().collect();
                let unique: BTreeSet<usize> = drawn.iter().copied().collect();
                assert_eq!(drawn.len(), unique.len(), "edge drawn twice");

                let reach = reachable(&g, &root);
                let expected: BTreeSet<usize> = g
                    .edges()
                    .iter()
                    .filter(|edge| reach.contains(&edge.from))
                    .map(|edge| edge.primitive)
                    .collect();
                assert_eq!(unique, expected);

                let expanded: usize = decompose_nodes(&g, &root).iter().map(Vec::len).sum();
                assert_eq!(expanded + 1, reach.len());
            }
        }
    }
}
