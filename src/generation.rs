use crate::ir::TargetId;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Run token captured by deferred work; stale once the target's counter moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-target monotonic counters.
///
/// Counters are never dropped, not even on dispose: a reset counter could hand out a
/// generation that an old timer still carries.
#[derive(Debug, Clone, Default)]
pub struct Generations {
    current: HashMap<TargetId, u64>,
}

impl Generations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `target` to a fresh generation and returns it.
    pub fn advance(&mut self, target: &TargetId) -> Generation {
        let counter = self.current.entry(target.clone()).or_insert(0);
        *counter += 1;
        Generation(*counter)
    }

    pub fn current(&self, target: &TargetId) -> Generation {
        Generation(self.current.get(target).copied().unwrap_or(0))
    }

    pub fn is_current(&self, target: &TargetId, generation: Generation) -> bool {
        self.current(target) == generation
    }

    /// Makes every outstanding token for `target` stale.
    pub fn invalidate(&mut self, target: &TargetId) {
        self.advance(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_latest_generation_is_current() {
        let mut gens = Generations::new();
        let t = TargetId::new("a");
        let first = gens.advance(&t);
        let second = gens.advance(&t);
        assert!(second > first);
        assert!(!gens.is_current(&t, first));
        assert!(gens.is_current(&t, second));
        gens.invalidate(&t);
        assert!(!gens.is_current(&t, second));
    }

    #[test]
    fn targets_count_independently() {
        let mut gens = Generations::new();
        let a = TargetId::new("a");
        let b = TargetId::new("b");
        gens.advance(&a);
        gens.advance(&a);
        assert_eq!(gens.advance(&b), Generation(1));
        assert_eq!(gens.current(&a), Generation(2));
        assert_eq!(gens.current(&TargetId::new("c")), Generation(0));
    }
}
