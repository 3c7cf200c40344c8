use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque node token, unique within one diagram instance.
pub type NodeId = String;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramKind {
    Flowchart,
    Sequence,
    State,
    #[default]
    Other,
}

/// Handle to a connector drawn by the renderer, numbered in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectorId(pub usize);

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A rendering target (the container a diagram is drawn into).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(pub String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One `(from, to, primitive)` triple as handed over by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEdge<P> {
    pub from: NodeId,
    pub to: NodeId,
    pub primitive: P,
}

impl<P> RawEdge<P> {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>, primitive: P) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            primitive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: NodeId,
    pub to: NodeId,
    pub label: Option<String>,
}

/// A drawn connector between two nodes: a flowchart link, a state transition or a sequence
/// message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connector {
    pub id: ConnectorId,
    pub from: NodeId,
    pub to: NodeId,
    pub label: Option<String>,
}
