//! Per-target playback sessions.

use crate::error::AnimateError;
use crate::generation::Generation;
use crate::ir::TargetId;
use crate::playback::{Playhead, Tick};
use crate::stage::Stage;
use crate::timeline::{Effect, Instruction, MarkerId, Timeline};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

#[derive(Debug)]
pub struct Session<P> {
    pub timeline: Timeline<P>,
    pub playhead: Playhead,
    pub generation: Option<Generation>,
}

/// Owns at most one session per target. Installing over an existing session tears the old one
/// down first, so a target's markers always belong to its current session.
#[derive(Debug)]
pub struct TimelineManager<P> {
    sessions: IndexMap<TargetId, Session<P>>,
}

impl<P> Default for TimelineManager<P> {
    fn default() -> Self {
        Self {
            sessions: IndexMap::new(),
        }
    }
}

impl<P> TimelineManager<P>
where
    P: Clone + Hash + Eq + Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the session of `target`. The new timeline starts paused at zero with its
    /// stroke-drawn primitives hidden and its markers spawned.
    #[tracing::instrument(level = "debug", skip_all, fields(target = %target, instructions = timeline.len()))]
    pub fn install(
        &mut self,
        target: &TargetId,
        timeline: Timeline<P>,
        generation: Option<Generation>,
        stage: &mut dyn Stage<P>,
    ) -> Result<(), AnimateError> {
        self.teardown(target, stage);

        if let Some(missing) = timeline
            .primitives()
            .find(|primitive| !stage.contains(target, primitive))
        {
            return Err(AnimateError::unknown_primitive(target, missing));
        }

        for spec in &timeline.markers {
            stage.spawn_marker(target, spec)?;
        }
        for instruction in &timeline.instructions {
            if instruction.effect == Effect::StrokeDraw {
                stage.apply(target, instruction, 0.0)?;
            }
        }

        let playhead = Playhead::new(timeline.duration(), timeline.looping);
        self.sessions.insert(
            target.clone(),
            Session {
                timeline,
                playhead,
                generation,
            },
        );
        tracing::debug!(?generation, "session installed");
        Ok(())
    }

    pub fn current(&self, target: &TargetId) -> Option<&Timeline<P>> {
        self.sessions.get(target).map(|session| &session.timeline)
    }

    pub fn session(&self, target: &TargetId) -> Option<&Session<P>> {
        self.sessions.get(target)
    }

    pub fn generation(&self, target: &TargetId) -> Option<Generation> {
        self.sessions.get(target).and_then(|session| session.generation)
    }

    /// Returns false when `target` has no session.
    pub fn play(&mut self, target: &TargetId, from: Option<f64>) -> bool {
        match self.sessions.get_mut(target) {
            Some(session) => {
                session.playhead.play(from);
                session.playhead.is_playing()
            }
            None => false,
        }
    }

    /// Returns whether a playing session was paused.
    pub fn pause(&mut self, target: &TargetId) -> bool {
        self.sessions
            .get_mut(target)
            .is_some_and(|session| session.playhead.pause())
    }

    pub fn is_playing(&self, target: &TargetId) -> bool {
        self.sessions
            .get(target)
            .is_some_and(|session| session.playhead.is_playing())
    }

    /// Tears down the session of `target`, if any. Never fails.
    pub fn dispose(&mut self, target: &TargetId, stage: &mut dyn Stage<P>) -> bool {
        self.teardown(target, stage)
    }

    pub fn sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Shortest time until a playing, non-looping session completes.
    pub fn next_completion(&self) -> Option<f64> {
        self.sessions
            .values()
            .filter_map(|session| session.playhead.remaining())
            .reduce(f64::min)
    }

    /// Moves every playing session forward by `dt` seconds and draws the result.
    pub fn advance(&mut self, dt: f64, stage: &mut dyn Stage<P>) -> Vec<(TargetId, Tick)> {
        let mut ticks = Vec::new();
        for (target, session) in self.sessions.iter_mut() {
            if !session.playhead.is_playing() {
                continue;
            }
            let tick = session.playhead.advance(dt);
            draw_at(target, &session.timeline, tick.position, stage);
            if tick.completed && session.timeline.remove_markers_on_complete {
                if let Err(err) = stage.remove_markers(target) {
                    tracing::debug!(%target, %err, "marker cleanup failed");
                }
            }
            ticks.push((target.clone(), tick));
        }
        ticks
    }

    fn teardown(&mut self, target: &TargetId, stage: &mut dyn Stage<P>) -> bool {
        let Some(mut session) = self.sessions.shift_remove(target) else {
            return false;
        };
        session.playhead.cancel();

        let mut seen = std::collections::HashSet::new();
        for primitive in session.timeline.primitives() {
            if !seen.insert(primitive) {
                continue;
            }
            if let Err(err) = stage.reset(target, primitive) {
                tracing::debug!(%target, %primitive, %err, "reset failed during teardown");
            }
        }
        if !session.timeline.markers.is_empty() {
            if let Err(err) = stage.remove_markers(target) {
                tracing::debug!(%target, %err, "marker removal failed during teardown");
            }
        }
        tracing::debug!(%target, "session torn down");
        true
    }
}

/// Applies `timeline` as it looks at time `t`. Stroke draws are all applied; each marker only
/// follows the latest instruction that has started.
fn draw_at<P>(target: &TargetId, timeline: &Timeline<P>, t: f64, stage: &mut dyn Stage<P>) {
    let mut followed: HashMap<MarkerId, &Instruction<P>> = HashMap::new();
    for instruction in &timeline.instructions {
        match instruction.effect {
            Effect::StrokeDraw => {
                if let Err(err) = stage.apply(target, instruction, instruction.progress_at(t)) {
                    tracing::debug!(%target, %err, "stroke update failed");
                }
            }
            Effect::Follow { marker } => {
                if instruction.start > t {
                    continue;
                }
                let replace = followed
                    .get(&marker)
                    .is_none_or(|current| current.start <= instruction.start);
                if replace {
                    followed.insert(marker, instruction);
                }
            }
        }
    }
    for instruction in followed.into_values() {
        if let Err(err) = stage.apply(target, instruction, instruction.progress_at(t)) {
            tracing::debug!(%target, %err, "marker update failed");
        }
    }
}
