//! In-memory player directory fed by inbound events

use std::collections::BTreeMap;

use glam::DVec3;

use crate::physics::PlayerId;

use super::PlayerDirectory;

/// Vertical movement counts half as much toward recent speed
const VERTICAL_SPEED_SCALE: f64 = 2.0;

/// Everything the simulation knows about one player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub position: DVec3,
    /// Full look direction, vertical component included
    pub look: DVec3,
    /// Distance covered by the last movement, `None` until the first one
    pub speed: Option<f64>,
    /// Whether the player's mode allows touching cubes
    pub interactable: bool,
    pub last_action_ms: u64,
}

impl PlayerRecord {
    pub fn new(id: PlayerId, position: DVec3, look: DVec3, now: u64) -> Self {
        Self {
            id,
            position,
            look,
            speed: None,
            interactable: true,
            last_action_ms: now,
        }
    }

    pub fn is_afk(&self, now: u64, threshold_ms: u64) -> bool {
        now.saturating_sub(self.last_action_ms) > threshold_ms
    }
}

/// Connected players ordered by id
#[derive(Debug, Default)]
pub struct PlayerRoster {
    players: BTreeMap<PlayerId, PlayerRecord>,
}

impl PlayerRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player. A repeated join only refreshes position and look.
    /// Returns true for a new player.
    pub fn join(&mut self, id: PlayerId, position: DVec3, look: DVec3, now: u64) -> bool {
        match self.players.get_mut(&id) {
            Some(existing) => {
                existing.position = position;
                existing.look = look;
                existing.last_action_ms = now;
                false
            }
            None => {
                self.players
                    .insert(id, PlayerRecord::new(id, position, look, now));
                true
            }
        }
    }

    /// Apply a movement and return the derived speed.
    ///
    /// Position and look always follow the client. Speed and activity are
    /// only recorded for an interactable player that actually moved.
    pub fn move_to(
        &mut self,
        id: &PlayerId,
        position: DVec3,
        look: DVec3,
        now: u64,
    ) -> Option<f64> {
        let player = self.players.get_mut(id)?;
        let delta = position - player.position;
        player.position = position;
        player.look = look;

        if delta == DVec3::ZERO || !player.interactable {
            return None;
        }

        let dy = delta.y / VERTICAL_SPEED_SCALE;
        let speed = (delta.x * delta.x + dy * dy + delta.z * delta.z).sqrt();
        player.speed = Some(speed);
        player.last_action_ms = now;
        Some(speed)
    }

    pub fn set_interactable(&mut self, id: &PlayerId, interactable: bool) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                player.interactable = interactable;
                true
            }
            None => false,
        }
    }

    pub fn record_action(&mut self, id: &PlayerId, now: u64) {
        if let Some(player) = self.players.get_mut(id) {
            player.last_action_ms = now;
        }
    }

    pub fn leave(&mut self, id: &PlayerId) -> Option<PlayerRecord> {
        self.players.remove(id)
    }

    pub fn get(&self, id: &PlayerId) -> Option<&PlayerRecord> {
        self.players.get(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl PlayerDirectory for PlayerRoster {
    fn players(&self) -> Vec<&PlayerRecord> {
        self.players.values().collect()
    }

    fn contains(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }
}
