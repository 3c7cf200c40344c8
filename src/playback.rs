// Completion tolerance for accumulated float error.
const EPSILON: f64 = 1e-9;

/// Position of one timeline on its own clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Paused,
    Playing,
    Finished,
    Cancelled,
}

/// What one `advance` did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tick {
    pub position: f64,
    pub completed: bool,
    /// Number of times the playhead wrapped back to zero.
    pub looped: u32,
}

/// Minimal tween engine: a clock over `[0, duration]` that can play, pause, loop and be
/// cancelled. Zero-length timelines complete on their first tick and never loop.
#[derive(Debug, Clone)]
pub struct Playhead {
    position: f64,
    duration: f64,
    looping: bool,
    state: PlayState,
}

impl Playhead {
    pub fn new(duration: f64, looping: bool) -> Self {
        Self {
            position: 0.0,
            duration: duration.max(0.0),
            looping,
            state: PlayState::Paused,
        }
    }

    /// Starts playing, seeking to `from` first when given. A cancelled playhead stays cancelled.
    pub fn play(&mut self, from: Option<f64>) {
        if self.state == PlayState::Cancelled {
            return;
        }
        if let Some(from) = from {
            self.position = from.clamp(0.0, self.duration);
        }
        if self.state == PlayState::Finished && from.is_none() {
            self.position = 0.0;
        }
        self.state = PlayState::Playing;
    }

    /// Returns whether the playhead was playing.
    pub fn pause(&mut self) -> bool {
        let was_playing = self.state == PlayState::Playing;
        if was_playing {
            self.state = PlayState::Paused;
        }
        was_playing
    }

    pub fn cancel(&mut self) {
        self.state = PlayState::Cancelled;
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    fn loops(&self) -> bool {
        self.looping && self.duration > 0.0
    }

    /// Time until a non-looping playhead completes, if it is playing.
    pub fn remaining(&self) -> Option<f64> {
        (self.is_playing() && !self.loops()).then(|| (self.duration - self.position).max(0.0))
    }

    pub fn advance(&mut self, dt: f64) -> Tick {
        if !self.is_playing() {
            return Tick {
                position: self.position,
                ..Tick::default()
            };
        }

        let mut tick = Tick::default();
        let next = self.position + dt.max(0.0);
        if self.loops() {
            let wraps = (next / self.duration).floor();
            tick.looped = wraps as u32;
            self.position = next - wraps * self.duration;
        } else if next >= self.duration - EPSILON {
            self.position = self.duration;
            self.state = PlayState::Finished;
            tick.completed = true;
        } else {
            self.position = next;
        }
        tick.position = self.position;
        tick
    }
}
