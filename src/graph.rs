use crate::ir::{NodeId, RawEdge};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What `roots_with` returns when no node is free of incoming edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RootFallback {
    /// Keep the empty root set; the caller decides what to do.
    #[default]
    None,
    /// Start from the first node that appears in the edge list.
    FirstNode,
}

/// Directed graph over diagram nodes.
///
/// The adjacency indexes are derived from `edges` when the graph is built and are never
/// patched afterwards; build a new graph when the edge list changes.
#[derive(Debug, Clone)]
pub struct Graph<P> {
    nodes: IndexSet<NodeId>,
    outgoing: IndexMap<NodeId, IndexSet<NodeId>>,
    edges: Vec<RawEdge<P>>,
    // edge indices per source node, in edge-list order
    out_edges: IndexMap<NodeId, Vec<usize>>,
}

impl<P> Graph<P> {
    pub fn build<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = RawEdge<P>>,
    {
        let mut graph = Self {
            nodes: IndexSet::new(),
            outgoing: IndexMap::new(),
            edges: Vec::new(),
            out_edges: IndexMap::new(),
        };
        for edge in edges {
            if edge.from.trim().is_empty() || edge.to.trim().is_empty() {
                tracing::trace!(from = %edge.from, to = %edge.to, "dropping edge with empty endpoint");
                continue;
            }
            graph.nodes.insert(edge.from.clone());
            graph.nodes.insert(edge.to.clone());
            graph
                .outgoing
                .entry(edge.from.clone())
                .or_default()
                .insert(edge.to.clone());
            graph
                .out_edges
                .entry(edge.from.clone())
                .or_default()
                .push(graph.edges.len());
            graph.edges.push(edge);
        }
        graph
    }

    /// Nodes that never appear as the target of an edge, in first-appearance order.
    pub fn roots(&self) -> Vec<NodeId> {
        let targets: HashSet<&str> = self.edges.iter().map(|edge| edge.to.as_str()).collect();
        self.nodes
            .iter()
            .filter(|node| !targets.contains(node.as_str()))
            .cloned()
            .collect()
    }

    pub fn roots_with(&self, fallback: RootFallback) -> Vec<NodeId> {
        let roots = self.roots();
        if !roots.is_empty() {
            return roots;
        }
        match fallback {
            RootFallback::None => roots,
            RootFallback::FirstNode => self.nodes.first().cloned().into_iter().collect(),
        }
    }

    pub fn outgoing_edges<'a>(&'a self, node: &str) -> impl Iterator<Item = &'a RawEdge<P>> + 'a {
        self.out_edges
            .get(node)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.edges[idx])
    }

    pub fn successors<'a>(&'a self, node: &str) -> impl Iterator<Item = &'a NodeId> + 'a {
        self.outgoing.get(node).into_iter().flatten()
    }

    pub fn contains(&self, node: &str) -> bool {
        self.nodes.contains(node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> &[RawEdge<P>] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

impl<P> Default for Graph<P> {
    fn default() -> Self {
        Self::build(std::iter::empty())
    }
}
