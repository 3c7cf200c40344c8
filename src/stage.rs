use crate::error::StageError;
use crate::ir::TargetId;
use crate::timeline::{Effect, Instruction, MarkerId, MarkerSpec};
use indexmap::IndexSet;
use std::collections::HashMap;
use std::hash::Hash;

/// The drawing surface timelines are applied to.
///
/// Markers are spawned under a target scope and only ever removed as a whole scope.
pub trait Stage<P> {
    /// Replaces the drawables known for `target`.
    fn mount(&mut self, target: &TargetId, primitives: Vec<P>);

    fn contains(&self, target: &TargetId, primitive: &P) -> bool;

    /// Restores a primitive to its untouched look.
    fn reset(&mut self, target: &TargetId, primitive: &P) -> Result<(), StageError>;

    fn apply(
        &mut self,
        target: &TargetId,
        instruction: &Instruction<P>,
        progress: f64,
    ) -> Result<(), StageError>;

    /// Adds a hidden marker; it becomes visible when it first moves.
    fn spawn_marker(&mut self, target: &TargetId, spec: &MarkerSpec) -> Result<(), StageError>;

    fn remove_markers(&mut self, target: &TargetId) -> Result<(), StageError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerState<P> {
    pub spec: MarkerSpec,
    pub visible: bool,
    /// Primitive the marker is travelling along and its eased progress.
    pub along: Option<(P, f64)>,
}

/// In-memory stage that records the visual state of every target.
#[derive(Debug, Clone)]
pub struct MemoryStage<P> {
    mounted: HashMap<TargetId, IndexSet<P>>,
    // revealed fraction per stroke-drawn primitive; absent means untouched
    strokes: HashMap<TargetId, HashMap<P, f64>>,
    markers: HashMap<TargetId, Vec<MarkerState<P>>>,
}

impl<P> Default for MemoryStage<P> {
    fn default() -> Self {
        Self {
            mounted: HashMap::new(),
            strokes: HashMap::new(),
            markers: HashMap::new(),
        }
    }
}

impl<P: Clone + Hash + Eq> MemoryStage<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unmount(&mut self, target: &TargetId) {
        self.mounted.remove(target);
        self.strokes.remove(target);
        self.markers.remove(target);
    }

    pub fn is_mounted(&self, target: &TargetId) -> bool {
        self.mounted.contains_key(target)
    }

    /// Revealed fraction of a stroke, `None` when the primitive is untouched.
    pub fn stroke(&self, target: &TargetId, primitive: &P) -> Option<f64> {
        self.strokes.get(target)?.get(primitive).copied()
    }

    pub fn markers(&self, target: &TargetId) -> &[MarkerState<P>] {
        self.markers.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn marker(&self, target: &TargetId, id: MarkerId) -> Option<&MarkerState<P>> {
        self.markers(target).iter().find(|m| m.spec.id == id)
    }

    fn ensure_mounted(&self, target: &TargetId) -> Result<(), StageError> {
        if self.mounted.contains_key(target) {
            Ok(())
        } else {
            Err(StageError::Unmounted(target.clone()))
        }
    }
}

impl<P: Clone + Hash + Eq> Stage<P> for MemoryStage<P> {
    fn mount(&mut self, target: &TargetId, primitives: Vec<P>) {
        self.mounted
            .insert(target.clone(), primitives.into_iter().collect());
        self.strokes.remove(target);
    }

    fn contains(&self, target: &TargetId, primitive: &P) -> bool {
        self.mounted
            .get(target)
            .is_some_and(|prims| prims.contains(primitive))
    }

    fn reset(&mut self, target: &TargetId, primitive: &P) -> Result<(), StageError> {
        self.ensure_mounted(target)?;
        if let Some(strokes) = self.strokes.get_mut(target) {
            strokes.remove(primitive);
        }
        Ok(())
    }

    fn apply(
        &mut self,
        target: &TargetId,
        instruction: &Instruction<P>,
        progress: f64,
    ) -> Result<(), StageError> {
        self.ensure_mounted(target)?;
        match instruction.effect {
            Effect::StrokeDraw => {
                self.strokes
                    .entry(target.clone())
                    .or_default()
                    .insert(instruction.primitive.clone(), progress);
            }
            Effect::Follow { marker } => {
                let state = self
                    .markers
                    .get_mut(target)
                    .and_then(|markers| markers.iter_mut().find(|m| m.spec.id == marker))
                    .ok_or_else(|| StageError::Surface(format!("no {marker} on `{target}`")))?;
                state.visible = true;
                state.along = Some((instruction.primitive.clone(), progress));
            }
        }
        Ok(())
    }

    fn spawn_marker(&mut self, target: &TargetId, spec: &MarkerSpec) -> Result<(), StageError> {
        self.ensure_mounted(target)?;
        self.markers
            .entry(target.clone())
            .or_default()
            .push(MarkerState {
                spec: spec.clone(),
                visible: false,
                along: None,
            });
        Ok(())
    }

    fn remove_markers(&mut self, target: &TargetId) -> Result<(), StageError> {
        self.ensure_mounted(target)?;
        self.markers.remove(target);
        Ok(())
    }
}
