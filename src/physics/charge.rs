//! Per-player charge held while the charging gesture is active

use std::collections::HashMap;

use crate::config::PhysicsTuning;

use super::PlayerId;

/// Charge values for every player currently holding the charge gesture.
///
/// Values start at 0 and approach `base` geometrically; they stay in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct ChargeAccumulator {
    charges: HashMap<PlayerId, f64>,
    base: f64,
    recovery_rate: f64,
}

impl ChargeAccumulator {
    pub fn new(base: f64, recovery_rate: f64) -> Self {
        Self {
            charges: HashMap::new(),
            base: base.clamp(0.0, 1.0),
            recovery_rate: recovery_rate.clamp(0.0, 1.0),
        }
    }

    pub fn from_tuning(tuning: &PhysicsTuning) -> Self {
        Self::new(tuning.charge_base_value, tuning.charge_recovery_rate)
    }

    /// Start (or restart) charging from zero
    pub fn begin(&mut self, player: PlayerId) {
        self.charges.insert(player, 0.0);
    }

    /// Stop charging. Returns whether the player was charging.
    pub fn end(&mut self, player: &PlayerId) -> bool {
        self.charges.remove(player).is_some()
    }

    pub fn is_charging(&self, player: &PlayerId) -> bool {
        self.charges.contains_key(player)
    }

    /// Current charge, 0 when not charging
    pub fn value(&self, player: &PlayerId) -> f64 {
        self.charges.get(player).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.charges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charges.is_empty()
    }

    /// One recovery step toward `base`
    pub fn step(&self, charge: f64) -> f64 {
        (self.base - (self.base - charge) * self.recovery_rate).clamp(0.0, 1.0)
    }

    /// Advance every charge by one step.
    ///
    /// Entries whose player is gone are dropped first. `publish` receives the
    /// new level of every remaining player.
    pub fn advance<P, F>(&mut self, is_present: P, mut publish: F)
    where
        P: Fn(&PlayerId) -> bool,
        F: FnMut(PlayerId, f64),
    {
        if self.charges.is_empty() {
            return;
        }
        self.charges.retain(|id, _| is_present(id));

        let ids: Vec<PlayerId> = self.charges.keys().copied().collect();
        for id in ids {
            let next = self.step(self.value(&id));
            self.charges.insert(id, next);
            publish(id, next);
        }
    }
}
