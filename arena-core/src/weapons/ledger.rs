//! Per-target hit cooldowns for continuous-contact weapons.

use std::collections::HashMap;

use crate::constants::{
    CONTACT_HIT_WINDOW, HIT_LEDGER_MAX_AGE, HIT_LEDGER_PRUNE_THRESHOLD, TIME_EPSILON,
};
use crate::entities::TargetRef;

/// Remembers when each target was last hit so a weapon touching it every
/// tick only damages it once per window.
#[derive(Debug, Clone)]
pub struct HitLedger {
    window: f64,
    last_hit: HashMap<TargetRef, f64>,
}

impl Default for HitLedger {
    fn default() -> Self {
        Self::new(CONTACT_HIT_WINDOW)
    }
}

impl HitLedger {
    pub fn new(window: f64) -> Self {
        Self {
            window,
            last_hit: HashMap::new(),
        }
    }

    pub fn ready(&self, target: TargetRef, now: f64) -> bool {
        match self.last_hit.get(&target) {
            Some(t) => now - t + TIME_EPSILON >= self.window,
            None => true,
        }
    }

    /// Record a hit if the target is off cooldown. Returns whether it was.
    pub fn try_hit(&mut self, target: TargetRef, now: f64) -> bool {
        if !self.ready(target, now) {
            return false;
        }
        self.last_hit.insert(target, now);
        true
    }

    /// Evict stale entries once the map grows past the threshold.
    pub fn prune(&mut self, now: f64) {
        if self.last_hit.len() > HIT_LEDGER_PRUNE_THRESHOLD {
            self.last_hit
                .retain(|_, t| now - *t <= HIT_LEDGER_MAX_AGE);
        }
    }

    pub fn len(&self) -> usize {
        self.last_hit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_hit.is_empty()
    }
}
