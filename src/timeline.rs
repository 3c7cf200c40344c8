use crate::ease::Ease;
use serde::Serialize;
use std::fmt;

/// Identifier of a follower marker, local to one timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MarkerId(pub usize);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "marker-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub id: MarkerId,
    pub color: String,
    pub radius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Effect {
    /// Reveal the primitive's stroke from its start to its end.
    StrokeDraw,
    /// Move a marker along the primitive's path.
    Follow { marker: MarkerId },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruction<P> {
    pub primitive: P,
    /// Offset on the timeline clock, in seconds.
    pub start: f64,
    pub duration: f64,
    pub ease: Ease,
    pub effect: Effect,
}

impl<P> Instruction<P> {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Eased progress in `[0, 1]` at timeline time `t`.
    pub fn progress_at(&self, t: f64) -> f64 {
        if t < self.start {
            return 0.0;
        }
        if self.duration <= 0.0 {
            return 1.0;
        }
        self.ease.apply((t - self.start) / self.duration)
    }
}

/// Time-positioned animation instructions on one shared clock.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline<P> {
    pub instructions: Vec<Instruction<P>>,
    pub markers: Vec<MarkerSpec>,
    #[serde(rename = "loop")]
    pub looping: bool,
    /// Drop the spawned markers once a non-looping run completes.
    pub remove_markers_on_complete: bool,
}

impl<P> Default for Timeline<P> {
    fn default() -> Self {
        Self {
            instructions: Vec::new(),
            markers: Vec::new(),
            looping: false,
            remove_markers_on_complete: false,
        }
    }
}

impl<P> Timeline<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// End of the last instruction; zero for an empty timeline.
    pub fn duration(&self) -> f64 {
        self.instructions
            .iter()
            .map(Instruction::end)
            .fold(0.0, f64::max)
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn primitives(&self) -> impl Iterator<Item = &P> {
        self.instructions.iter().map(|instr| &instr.primitive)
    }

    /// Distinct start offsets in ascending order.
    pub fn offsets(&self) -> Vec<f64> {
        let mut offsets: Vec<f64> = self.instructions.iter().map(|instr| instr.start).collect();
        offsets.sort_by(f64::total_cmp);
        offsets.dedup();
        offsets
    }

    /// Places `other` on this timeline at `offset`. Marker ids of `other` are renumbered after
    /// the markers already present.
    pub fn merge_at(&mut self, other: Timeline<P>, offset: f64) {
        let base = self.markers.len();
        self.markers.extend(other.markers.into_iter().map(|mut spec| {
            spec.id = MarkerId(spec.id.0 + base);
            spec
        }));
        self.instructions
            .extend(other.instructions.into_iter().map(|mut instr| {
                instr.start += offset;
                if let Effect::Follow { marker } = &mut instr.effect {
                    *marker = MarkerId(marker.0 + base);
                }
                instr
            }));
        self.remove_markers_on_complete |= other.remove_markers_on_complete;
    }
}
