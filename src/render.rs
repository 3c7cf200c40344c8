use crate::error::RenderError;
use crate::ir::{ConnectorId, DiagramKind, NodeId, RawEdge, TargetId, Transition};
use crate::parser::parse_mermaid;
use indexmap::IndexSet;
use serde::Serialize;
use std::fmt::{Debug, Display};
use std::hash::Hash;

const STATE_TERMINAL: &str = "[*]";

/// Drawables produced for one target. Laid out and stable for a playback cycle.
#[derive(Debug, Clone, Serialize)]
pub struct VisualTree<P: Hash + Eq> {
    pub connectors: IndexSet<P>,
    pub nodes: IndexSet<NodeId>,
}

impl<P: Hash + Eq> VisualTree<P> {
    pub fn contains(&self, primitive: &P) -> bool {
        self.connectors.contains(primitive)
    }
}

impl<P: Hash + Eq> Default for VisualTree<P> {
    fn default() -> Self {
        Self {
            connectors: IndexSet::new(),
            nodes: IndexSet::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedDiagram<P: Hash + Eq> {
    pub target: TargetId,
    pub kind: DiagramKind,
    pub tree: VisualTree<P>,
    /// Animated edges in document order.
    pub edges: Vec<RawEdge<P>>,
    /// State transitions, without those touching `[*]`.
    pub transitions: Vec<Transition>,
    pub init_config: Option<serde_json::Value>,
}

/// Draws diagram source into a target and reports what it drew.
pub trait DiagramRenderer {
    type Primitive: Clone + Hash + Eq + Debug + Display;

    fn render(
        &mut self,
        target: &TargetId,
        source: &str,
    ) -> Result<RenderedDiagram<Self::Primitive>, RenderError>;
}

/// Renderer that works from the Mermaid text alone; every connector is identified by its
/// document-order index.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl DiagramRenderer for TextRenderer {
    type Primitive = ConnectorId;

    fn render(
        &mut self,
        target: &TargetId,
        source: &str,
    ) -> Result<RenderedDiagram<ConnectorId>, RenderError> {
        let parsed = parse_mermaid(source)?;

        let tree = VisualTree {
            connectors: parsed.connectors.iter().map(|c| c.id).collect(),
            nodes: parsed.nodes.iter().cloned().collect(),
        };

        let animated = parsed.connectors.iter().filter(|c| {
            parsed.kind != DiagramKind::State
                || (c.from != STATE_TERMINAL && c.to != STATE_TERMINAL)
        });
        let edges: Vec<RawEdge<ConnectorId>> = animated
            .clone()
            .map(|c| RawEdge::new(c.from.clone(), c.to.clone(), c.id))
            .collect();
        let transitions = if parsed.kind == DiagramKind::State {
            animated
                .map(|c| Transition {
                    from: c.from.clone(),
                    to: c.to.clone(),
                    label: c.label.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(RenderedDiagram {
            target: target.clone(),
            kind: parsed.kind,
            tree,
            edges,
            transitions,
            init_config: parsed.init_config,
        })
    }
}
