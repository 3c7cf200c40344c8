//! Single-threaded event loop on a virtual clock.
//!
//! Every piece of deferred work (replay timers, autoplay timers, completion notifications)
//! carries the token that was current when it was created and is dropped on delivery when
//! that token has moved on.

use crate::autoplay::{Action, Autoplay, AutoplayState, TimerKind};
use crate::config::AutoplayConfig;
use crate::error::{AnimateError, AnimateResult};
use crate::generation::{Generation, Generations};
use crate::ir::{NodeId, TargetId};
use crate::scheduler::TimerQueue;
use crate::session::TimelineManager;
use crate::stage::Stage;
use crate::timeline::Timeline;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::time::Duration;

/// Produces the timeline for one run, optionally starting from a node.
pub trait Program<P> {
    fn build(
        &mut self,
        target: &TargetId,
        start: Option<&str>,
        stage: &mut dyn Stage<P>,
    ) -> Result<Timeline<P>, AnimateError>;
}

impl<P, F> Program<P> for F
where
    F: FnMut(Option<&str>) -> Result<Timeline<P>, AnimateError>,
{
    fn build(
        &mut self,
        _target: &TargetId,
        start: Option<&str>,
        _stage: &mut dyn Stage<P>,
    ) -> Result<Timeline<P>, AnimateError> {
        self(start)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Event {
    Started {
        target: TargetId,
        generation: Generation,
    },
    Completed {
        target: TargetId,
        generation: Generation,
    },
    Looped {
        target: TargetId,
        count: u32,
    },
    Paused {
        target: TargetId,
    },
    Resumed {
        target: TargetId,
    },
    Disposed {
        target: TargetId,
    },
    Failed {
        target: TargetId,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub at: Duration,
    pub event: Event,
}

/// Returned by [`Runtime::attach_autoplay`]; pass it to [`Runtime::detach_autoplay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoplayHandle {
    target: TargetId,
    id: u64,
}

impl AutoplayHandle {
    pub fn target(&self) -> &TargetId {
        &self.target
    }
}

#[derive(Debug)]
enum Deferred {
    Autoplay {
        target: TargetId,
        handle: u64,
        kind: TimerKind,
        epoch: u64,
        generation: Generation,
    },
    Restart {
        target: TargetId,
        generation: Generation,
        start: Option<NodeId>,
    },
}

struct AutoplayEntry {
    handle: u64,
    machine: Autoplay,
}

struct LoopEntry {
    delay: Duration,
    start: Option<NodeId>,
}

pub struct Runtime<P, S> {
    now: Duration,
    stage: S,
    manager: TimelineManager<P>,
    generations: Generations,
    timers: TimerQueue<Deferred>,
    programs: HashMap<TargetId, Box<dyn Program<P>>>,
    autoplay: HashMap<TargetId, AutoplayEntry>,
    loops: HashMap<TargetId, LoopEntry>,
    next_handle: u64,
    events: Vec<TimedEvent>,
}

impl<P, S> Runtime<P, S>
where
    P: Clone + Hash + Eq + Display + 'static,
    S: Stage<P>,
{
    pub fn new(stage: S) -> Self {
        Self {
            now: Duration::ZERO,
            stage,
            manager: TimelineManager::new(),
            generations: Generations::new(),
            timers: TimerQueue::new(),
            programs: HashMap::new(),
            autoplay: HashMap::new(),
            loops: HashMap::new(),
            next_handle: 0,
            events: Vec::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    pub fn current(&self, target: &TargetId) -> Option<&Timeline<P>> {
        self.manager.current(target)
    }

    pub fn generation(&self, target: &TargetId) -> Generation {
        self.generations.current(target)
    }

    pub fn is_playing(&self, target: &TargetId) -> bool {
        self.manager.is_playing(target)
    }

    pub fn sessions(&self) -> usize {
        self.manager.sessions()
    }

    pub fn autoplay_state(&self, target: &TargetId) -> Option<AutoplayState> {
        self.autoplay.get(target).map(|entry| entry.machine.state())
    }

    /// Registers the program `run` and `restart_from_node` use for `target`.
    pub fn set_program(&mut self, target: &TargetId, program: impl Program<P> + 'static) {
        self.programs.insert(target.clone(), Box::new(program));
    }

    /// Installs `timeline` under a fresh generation and plays it from zero.
    pub fn install_and_play(
        &mut self,
        target: &TargetId,
        timeline: Timeline<P>,
    ) -> Result<Generation, AnimateError> {
        let generation = self.generations.advance(target);
        self.start(target, timeline, generation)?;
        Ok(generation)
    }

    /// Builds a timeline with the target's program and plays it. The latest call wins: work
    /// deferred by earlier runs goes stale.
    pub fn run(&mut self, target: &TargetId, start: Option<&str>) -> Result<Generation, AnimateError> {
        let program = self
            .programs
            .get_mut(target)
            .ok_or_else(|| AnimateError::NoProgram(target.clone()))?;
        let generation = self.generations.advance(target);
        let timeline = match program.build(target, start, &mut self.stage) {
            Ok(timeline) => timeline,
            Err(err) => {
                self.manager.dispose(target, &mut self.stage);
                return Err(err);
            }
        };
        if let Some(entry) = self.loops.get_mut(target) {
            entry.start = start.map(str::to_string);
        }
        self.start(target, timeline, generation)?;
        if let Some(entry) = self.autoplay.get_mut(target) {
            entry.machine.on_run();
        }
        Ok(generation)
    }

    pub fn restart_from_node(&mut self, target: &TargetId, node: &str) -> Result<Generation, AnimateError> {
        self.run(target, Some(node))
    }

    /// Pauses the current run and makes its pending replays stale.
    pub fn stop(&mut self, target: &TargetId) {
        self.generations.invalidate(target);
        if self.manager.pause(target) {
            self.emit(Event::Paused {
                target: target.clone(),
            });
        }
    }

    /// Continues a paused run from where it stopped. Returns false when it was already playing.
    pub fn resume(&mut self, target: &TargetId) -> AnimateResult<bool> {
        if self.manager.session(target).is_none() {
            return Err(AnimateError::UnknownTarget(target.clone()));
        }
        if self.manager.is_playing(target) || !self.manager.play(target, None) {
            return Ok(false);
        }
        self.emit(Event::Resumed {
            target: target.clone(),
        });
        Ok(true)
    }

    /// Tears the target down completely. Safe to call any number of times.
    pub fn dispose(&mut self, target: &TargetId) {
        self.generations.invalidate(target);
        let had_session = self.manager.dispose(target, &mut self.stage);
        let had_program = self.programs.remove(target).is_some();
        self.autoplay.remove(target);
        self.loops.remove(target);
        if had_session || had_program {
            self.emit(Event::Disposed {
                target: target.clone(),
            });
        }
    }

    pub fn attach_autoplay(
        &mut self,
        target: &TargetId,
        program: impl Program<P> + 'static,
        options: AutoplayConfig,
    ) -> AutoplayHandle {
        self.set_program(target, program);
        let id = self.next_handle;
        self.next_handle += 1;
        let mut machine = Autoplay::new(options);
        let actions = machine.attach();
        self.autoplay.insert(target.clone(), AutoplayEntry { handle: id, machine });
        self.apply_actions(target, actions);
        AutoplayHandle {
            target: target.clone(),
            id,
        }
    }

    /// Stops reacting to visibility for the handle's target. The current run, if any, keeps
    /// playing. Returns false for a handle that was already detached or replaced.
    pub fn detach_autoplay(&mut self, handle: &AutoplayHandle) -> bool {
        let matches = self
            .autoplay
            .get(&handle.target)
            .is_some_and(|entry| entry.handle == handle.id);
        if matches {
            self.autoplay.remove(&handle.target);
        }
        matches
    }

    /// Runs `program` now and again `restart_delay` after every completion, from the same
    /// start node as the last run.
    pub fn attach_loop(
        &mut self,
        target: &TargetId,
        program: impl Program<P> + 'static,
        restart_delay: Duration,
    ) -> Result<Generation, AnimateError> {
        self.set_program(target, program);
        self.loops.insert(
            target.clone(),
            LoopEntry {
                delay: restart_delay,
                start: None,
            },
        );
        self.run(target, None)
    }

    pub fn set_visibility(&mut self, target: &TargetId, ratio: f64) {
        let Some(entry) = self.autoplay.get_mut(target) else {
            return;
        };
        let actions = entry.machine.on_visibility(ratio);
        self.apply_actions(target, actions);
    }

    /// Completion report for the run tagged `generation`. Returns false when the report is
    /// stale and was ignored.
    pub fn notify_complete(&mut self, target: &TargetId, generation: Generation) -> bool {
        if !self.generations.is_current(target, generation) {
            tracing::trace!(%target, %generation, "stale completion");
            return false;
        }
        self.emit(Event::Completed {
            target: target.clone(),
            generation,
        });

        let looping = self.manager.current(target).is_some_and(|tl| tl.looping);
        if let Some(entry) = self.autoplay.get_mut(target) {
            let actions = entry.machine.on_complete(looping);
            self.apply_actions(target, actions);
        }
        if let Some(entry) = self.loops.get(target) {
            if self.would_spin(target, entry.delay) {
                tracing::debug!(%target, "empty timeline with zero restart delay, not looping");
            } else {
                let deferred = Deferred::Restart {
                    target: target.clone(),
                    generation,
                    start: entry.start.clone(),
                };
                self.timers.schedule(self.now + entry.delay, deferred);
            }
        }
        true
    }

    /// Moves the clock forward by `dt`, firing timers and completions in time order, and
    /// returns every event raised since the previous call.
    pub fn advance(&mut self, dt: Duration) -> Vec<TimedEvent> {
        let end = self.now + dt;
        loop {
            self.fire_due_timers();
            let mut step = end.saturating_sub(self.now);
            if let Some(due) = self.timers.next_due() {
                step = step.min(due.saturating_sub(self.now));
            }
            if let Some(left) = self.manager.next_completion() {
                step = step.min(ceil_duration(left));
            }
            self.tick(step);

            if self.now >= end {
                self.fire_due_timers();
                if self.manager.next_completion().is_none_or(|left| left > 0.0) {
                    break;
                }
            }
        }
        std::mem::take(&mut self.events)
    }

    /// Events raised outside `advance` (direct API calls) that nobody collected yet.
    pub fn take_events(&mut self) -> Vec<TimedEvent> {
        std::mem::take(&mut self.events)
    }

    fn start(
        &mut self,
        target: &TargetId,
        timeline: Timeline<P>,
        generation: Generation,
    ) -> Result<(), AnimateError> {
        self.manager
            .install(target, timeline, Some(generation), &mut self.stage)?;
        self.manager.play(target, Some(0.0));
        tracing::debug!(%target, %generation, "run started");
        self.emit(Event::Started {
            target: target.clone(),
            generation,
        });
        Ok(())
    }

    fn tick(&mut self, step: Duration) {
        let ticks = self.manager.advance(step.as_secs_f64(), &mut self.stage);
        self.now += step;
        for (target, tick) in ticks {
            if tick.looped > 0 {
                self.emit(Event::Looped {
                    target: target.clone(),
                    count: tick.looped,
                });
            }
            if tick.completed {
                if let Some(generation) = self.manager.generation(&target) {
                    self.notify_complete(&target, generation);
                }
            }
        }
    }

    fn fire_due_timers(&mut self) {
        while let Some((_, deferred)) = self.timers.pop_due(self.now) {
            match deferred {
                Deferred::Autoplay {
                    target,
                    handle,
                    kind,
                    epoch,
                    generation,
                } => {
                    if !self.generations.is_current(&target, generation) {
                        tracing::trace!(%target, %generation, ?kind, "autoplay timer outlived its run");
                        continue;
                    }
                    let Some(entry) = self.autoplay.get_mut(&target) else {
                        tracing::trace!(%target, "autoplay timer after detach");
                        continue;
                    };
                    if entry.handle != handle {
                        continue;
                    }
                    let actions = entry.machine.on_timer(kind, epoch);
                    self.apply_actions(&target, actions);
                }
                Deferred::Restart {
                    target,
                    generation,
                    start,
                } => {
                    if !self.generations.is_current(&target, generation) {
                        tracing::trace!(%target, %generation, "stale restart");
                        continue;
                    }
                    if let Err(err) = self.run(&target, start.as_deref()) {
                        self.fail(&target, err);
                    }
                }
            }
        }
    }

    fn apply_actions(&mut self, target: &TargetId, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Schedule { kind, delay, epoch } => {
                    let Some(entry) = self.autoplay.get(target) else {
                        continue;
                    };
                    if kind == TimerKind::Replay && self.would_spin(target, delay) {
                        tracing::debug!(%target, "empty timeline with zero replay delay, not replaying");
                        continue;
                    }
                    let deferred = Deferred::Autoplay {
                        target: target.clone(),
                        handle: entry.handle,
                        kind,
                        epoch,
                        generation: self.generations.current(target),
                    };
                    self.timers.schedule(self.now + delay, deferred);
                }
                Action::Run => {
                    if let Err(err) = self.run(target, None) {
                        self.fail(target, err);
                    }
                }
                Action::Pause => {
                    if self.manager.pause(target) {
                        self.emit(Event::Paused {
                            target: target.clone(),
                        });
                    }
                }
            }
        }
    }

    fn would_spin(&self, target: &TargetId, delay: Duration) -> bool {
        delay.is_zero()
            && self
                .manager
                .current(target)
                .is_none_or(|tl| tl.duration() <= 0.0)
    }

    fn fail(&mut self, target: &TargetId, err: AnimateError) {
        tracing::warn!(%target, %err, "deferred run failed");
        self.emit(Event::Failed {
            target: target.clone(),
            message: err.to_string(),
        });
    }

    fn emit(&mut self, event: Event) {
        self.events.push(TimedEvent {
            at: self.now,
            event,
        });
    }
}

fn ceil_duration(secs: f64) -> Duration {
    Duration::from_nanos((secs.max(0.0) * 1e9).ceil() as u64)
}
