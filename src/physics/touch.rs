//! Touch debounce ledger

use std::collections::HashMap;

use serde::Serialize;

use crate::config::PhysicsTuning;

use super::PlayerId;

/// Kind of physical interaction with a cube
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchType {
    RegularKick,
    ChargedKick,
    Rise,
}

/// Last accepted interaction of one type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchRecord {
    pub timestamp: u64,
    pub touch_type: TouchType,
}

/// Cooldown per touch type, in milliseconds
#[derive(Debug, Clone, Copy)]
pub struct TouchCooldowns {
    pub regular_kick: u64,
    pub charged_kick: u64,
    pub rise: u64,
}

impl TouchCooldowns {
    pub fn for_type(&self, touch_type: TouchType) -> u64 {
        match touch_type {
            TouchType::RegularKick => self.regular_kick,
            TouchType::ChargedKick => self.charged_kick,
            TouchType::Rise => self.rise,
        }
    }
}

impl From<&PhysicsTuning> for TouchCooldowns {
    fn from(t: &PhysicsTuning) -> Self {
        Self {
            regular_kick: t.regular_kick_cooldown_ms,
            charged_kick: t.charged_kick_cooldown_ms,
            rise: t.rise_cooldown_ms,
        }
    }
}

/// Per player, per type cooldown ledger.
///
/// One physical gesture can show up as several events (proximity touches on
/// consecutive ticks, a kick packet right after). Only the first one inside
/// the cooldown window counts.
#[derive(Debug, Clone)]
pub struct TouchDebounce {
    ledger: HashMap<PlayerId, HashMap<TouchType, TouchRecord>>,
    cooldowns: TouchCooldowns,
}

impl TouchDebounce {
    pub fn new(cooldowns: TouchCooldowns) -> Self {
        Self {
            ledger: HashMap::new(),
            cooldowns,
        }
    }

    /// Record an interaction, returns true if it was accepted
    pub fn record(&mut self, player: PlayerId, touch_type: TouchType, now: u64) -> bool {
        let cooldown = self.cooldowns.for_type(touch_type);
        let touches = self.ledger.entry(player).or_default();

        if let Some(existing) = touches.get(&touch_type) {
            if now.saturating_sub(existing.timestamp) <= cooldown {
                return false;
            }
        }

        touches.insert(
            touch_type,
            TouchRecord {
                timestamp: now,
                touch_type,
            },
        );
        true
    }

    /// Latest record of a type, expired or not
    pub fn last(&self, player: &PlayerId, touch_type: TouchType) -> Option<TouchRecord> {
        self.ledger
            .get(player)
            .and_then(|touches| touches.get(&touch_type))
            .copied()
    }

    /// Milliseconds until the type is accepted again, 0 when ready
    pub fn remaining(&self, player: &PlayerId, touch_type: TouchType, now: u64) -> u64 {
        self.last(player, touch_type)
            .map(|record| {
                let elapsed = now.saturating_sub(record.timestamp);
                (self.cooldowns.for_type(touch_type) + 1).saturating_sub(elapsed)
            })
            .unwrap_or(0)
    }

    /// Drop everything recorded for a player
    pub fn forget(&mut self, player: &PlayerId) {
        self.ledger.remove(player);
    }

    /// Remove expired records and empty player entries.
    /// Returns the number of records removed.
    pub fn sweep(&mut self, now: u64) -> usize {
        let cooldowns = self.cooldowns;
        let mut removed = 0;
        self.ledger.retain(|_, touches| {
            let before = touches.len();
            touches.retain(|touch_type, record| {
                now.saturating_sub(record.timestamp) <= cooldowns.for_type(*touch_type)
            });
            removed += before - touches.len();
            !touches.is_empty()
        });
        removed
    }

    /// Number of players with at least one record
    pub fn tracked_players(&self) -> usize {
        self.ledger.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn debounce() -> TouchDebounce {
        TouchDebounce::new(TouchCooldowns::from(&PhysicsTuning::default()))
    }

    #[test]
    fn test_rejects_inside_cooldown() {
        let mut touches = debounce();
        let player = Uuid::new_v4();

        assert!(touches.record(player, TouchType::RegularKick, 1_000));
        assert!(!touches.record(player, TouchType::RegularKick, 1_100));
        assert!(!touches.record(player, TouchType::RegularKick, 1_150));
        assert!(touches.record(player, TouchType::RegularKick, 1_151));
    }

    #[test]
    fn test_types_are_independent() {
        let mut touches = debounce();
        let player = Uuid::new_v4();

        assert!(touches.record(player, TouchType::RegularKick, 0));
        assert!(touches.record(player, TouchType::ChargedKick, 0));
        assert!(touches.record(player, TouchType::Rise, 0));
        assert!(!touches.record(player, TouchType::Rise, 499));

        let other = Uuid::new_v4();
        assert!(touches.record(other, TouchType::Rise, 499));
    }

    #[test]
    fn test_remaining_counts_down() {
        let mut touches = debounce();
        let player = Uuid::new_v4();
        assert_eq!(touches.remaining(&player, TouchType::ChargedKick, 0), 0);

        touches.record(player, TouchType::ChargedKick, 1_000);
        assert_eq!(touches.remaining(&player, TouchType::ChargedKick, 1_200), 301);
        assert_eq!(touches.remaining(&player, TouchType::ChargedKick, 1_501), 0);
    }

    #[test]
    fn test_sweep_removes_expired_only() {
        let mut touches = debounce();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        touches.record(a, TouchType::RegularKick, 0);
        touches.record(a, TouchType::Rise, 0);
        touches.record(b, TouchType::RegularKick, 0);

        // Regular kicks (150ms) expire, the rise (500ms) survives
        assert_eq!(touches.sweep(200), 2);
        assert_eq!(touches.tracked_players(), 1);
        assert!(touches.last(&a, TouchType::Rise).is_some());
        assert!(touches.last(&a, TouchType::RegularKick).is_none());

        assert_eq!(touches.sweep(600), 1);
        assert_eq!(touches.tracked_players(), 0);
    }

    #[test]
    fn test_forget_clears_player() {
        let mut touches = debounce();
        let player = Uuid::new_v4();
        touches.record(player, TouchType::Rise, 0);
        touches.forget(&player);
        assert!(touches.record(player, TouchType::Rise, 1));
    }
}
