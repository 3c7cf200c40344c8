//! Turns waves and ordered paths into timelines.

use crate::config::{DrawConfig, TracerConfig};
use crate::graph::Graph;
use crate::ir::NodeId;
use crate::timeline::{Effect, Instruction, MarkerId, MarkerSpec, Timeline};
use crate::waves::{Wave, decompose, decompose_roots};

/// One stroke-draw instruction per primitive; every primitive of a wave starts at the wave's
/// offset and the next wave starts `step + gap` later. Empty waves take no time.
pub fn compose_waves<P: Clone>(waves: &[Wave<P>], draw: &DrawConfig) -> Timeline<P> {
    let mut timeline = Timeline::new();
    let mut offset = 0.0;
    for wave in waves.iter().filter(|wave| !wave.is_empty()) {
        for primitive in wave {
            timeline.instructions.push(Instruction {
                primitive: primitive.clone(),
                start: offset,
                duration: draw.step,
                ease: draw.ease,
                effect: Effect::StrokeDraw,
            });
        }
        offset += draw.step + draw.gap;
    }
    timeline
}

/// Wave composition with a single primitive per wave.
pub fn compose_sequential<P: Clone>(primitives: &[P], draw: &DrawConfig) -> Timeline<P> {
    let waves: Vec<Wave<P>> = primitives.iter().map(|p| vec![p.clone()]).collect();
    compose_waves(&waves, draw)
}

/// `count` markers following `path` one primitive per `step`. Marker `k` is coloured from the
/// palette (wrapping) or `accent`, and sets off `k * stagger` seconds after the first.
pub fn compose_tracers<P: Clone>(
    path: &[P],
    tracer: &TracerConfig,
    step: f64,
    accent: &str,
) -> Timeline<P> {
    let mut timeline = Timeline::new();
    if path.is_empty() {
        return timeline;
    }
    let palette = tracer.palette();
    let stagger = tracer.stagger.unwrap_or(step);

    for k in 0..tracer.marker_count() {
        let marker = MarkerId(k);
        let color = if palette.is_empty() {
            accent.to_string()
        } else {
            palette[k % palette.len()].clone()
        };
        timeline.markers.push(MarkerSpec {
            id: marker,
            color,
            radius: tracer.size,
        });
        let base = k as f64 * stagger;
        for (i, primitive) in path.iter().enumerate() {
            timeline.instructions.push(Instruction {
                primitive: primitive.clone(),
                start: base + i as f64 * step,
                duration: step,
                ease: tracer.ease,
                effect: Effect::Follow { marker },
            });
        }
    }
    timeline
}

/// One wave timeline per root, all placed at offset zero of a shared master timeline.
pub fn compose_roots<P: Clone>(graph: &Graph<P>, roots: &[NodeId], draw: &DrawConfig) -> Timeline<P> {
    let mut master = Timeline::new();
    for (root, waves) in decompose_roots(graph, roots) {
        tracing::trace!(%root, waves = waves.len(), "composing root");
        master.merge_at(compose_waves(&waves, draw), 0.0);
    }
    master
}

/// `items` rotated to begin at index `start`, taken modulo the length. Negative indices count
/// from the end.
pub fn rotate<T: Clone>(items: &[T], start: isize) -> Vec<T> {
    if items.is_empty() {
        return Vec::new();
    }
    let pivot = start.rem_euclid(items.len() as isize) as usize;
    items[pivot..].iter().chain(&items[..pivot]).cloned().collect()
}

/// Waves from `start`, composed.
pub fn schedule_from_graph<P: Clone>(graph: &Graph<P>, start: &str, draw: &DrawConfig) -> Timeline<P> {
    compose_waves(&decompose(graph, start), draw)
}
