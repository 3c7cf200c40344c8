//! Visibility-driven autoplay.
//!
//! [`Autoplay`] is a pure state machine: it consumes visibility changes, timer firings and
//! completions and answers with the [`Action`]s the runtime should carry out.

use crate::config::AutoplayConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::time::Duration;

/// A target counts as visible from this intersection ratio on.
pub const VISIBILITY_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AutoplayState {
    Hidden,
    PendingStart,
    Playing,
    PendingReplay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimerKind {
    Start,
    Replay,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Arm a timer. It is only honoured when handed back with the same `epoch`.
    Schedule {
        kind: TimerKind,
        delay: Duration,
        epoch: u64,
    },
    Run,
    Pause,
}

#[derive(Debug, Clone)]
pub struct Autoplay {
    state: AutoplayState,
    options: AutoplayConfig,
    // bumped whenever pending timers must be forgotten
    epoch: u64,
    rng: StdRng,
}

impl Autoplay {
    pub fn new(options: AutoplayConfig) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            state: AutoplayState::Hidden,
            options,
            epoch: 0,
            rng,
        }
    }

    pub fn state(&self) -> AutoplayState {
        self.state
    }

    pub fn options(&self) -> &AutoplayConfig {
        &self.options
    }

    /// Initial actions. Without `when_visible` the start timer is armed right away.
    pub fn attach(&mut self) -> Vec<Action> {
        if self.options.when_visible {
            return Vec::new();
        }
        self.state = AutoplayState::PendingStart;
        vec![self.schedule(TimerKind::Start)]
    }

    pub fn on_visibility(&mut self, ratio: f64) -> Vec<Action> {
        if !self.options.when_visible {
            return Vec::new();
        }
        let visible = ratio >= VISIBILITY_THRESHOLD;
        match (self.state, visible) {
            (AutoplayState::Hidden, true) => {
                self.state = AutoplayState::PendingStart;
                self.forget_timers();
                vec![self.schedule(TimerKind::Start)]
            }
            (AutoplayState::Hidden, false) | (_, true) => Vec::new(),
            (previous, false) => {
                self.state = AutoplayState::Hidden;
                self.forget_timers();
                if matches!(
                    previous,
                    AutoplayState::Playing | AutoplayState::PendingReplay
                ) {
                    vec![Action::Pause]
                } else {
                    Vec::new()
                }
            }
        }
    }

    pub fn on_timer(&mut self, kind: TimerKind, epoch: u64) -> Vec<Action> {
        if epoch != self.epoch {
            tracing::trace!(?kind, epoch, current = self.epoch, "stale autoplay timer");
            return Vec::new();
        }
        match (self.state, kind) {
            (AutoplayState::PendingStart, TimerKind::Start)
            | (AutoplayState::PendingReplay, TimerKind::Replay) => {
                self.state = AutoplayState::Playing;
                vec![Action::Run]
            }
            _ => Vec::new(),
        }
    }

    /// A run finished. Looping timelines never wait for a replay.
    pub fn on_complete(&mut self, looping: bool) -> Vec<Action> {
        if looping || self.state != AutoplayState::Playing {
            return Vec::new();
        }
        self.state = AutoplayState::PendingReplay;
        vec![self.schedule(TimerKind::Replay)]
    }

    /// A run was started from outside the timers, e.g. a click. Whatever the pending timer
    /// would have started is already playing.
    pub fn on_run(&mut self) {
        if matches!(
            self.state,
            AutoplayState::PendingStart | AutoplayState::PendingReplay
        ) {
            self.state = AutoplayState::Playing;
            self.forget_timers();
        }
    }

    /// Invalidates every timer handed out so far.
    pub fn forget_timers(&mut self) {
        self.epoch += 1;
    }

    fn schedule(&mut self, kind: TimerKind) -> Action {
        let base = match kind {
            TimerKind::Start => self.options.start_delay(),
            TimerKind::Replay => self.options.replay_delay(),
        };
        Action::Schedule {
            kind,
            delay: self.jittered(base),
            epoch: self.epoch,
        }
    }

    fn jittered(&mut self, base: Duration) -> Duration {
        let jitter = self.options.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 || base.is_zero() {
            return base;
        }
        let factor = self.rng.random_range((1.0 - jitter)..=(1.0 + jitter));
        base.mul_f64(factor)
    }
}
