//! Per-tick read-only view of every player

use glam::DVec3;

use crate::config::PhysicsTuning;
use crate::world::{PlayerDirectory, SpatialQuery};

use super::formulae::horizontal;
use super::PlayerId;

/// One player as seen by the resolver during a single tick
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub position: DVec3,
    /// Horizontal unit facing, zero when looking straight up or down
    pub facing: DVec3,
    pub speed: f64,
    pub eligible: bool,
}

/// Snapshots of all players, sorted by id
#[derive(Debug, Clone, Default)]
pub struct PlayerSnapshotCache {
    snapshots: Vec<PlayerSnapshot>,
}

impl PlayerSnapshotCache {
    /// Build the view for this tick
    pub fn build<D>(directory: &D, now: u64, tuning: &PhysicsTuning) -> Self
    where
        D: PlayerDirectory + ?Sized,
    {
        let mut snapshots: Vec<PlayerSnapshot> = directory
            .players()
            .into_iter()
            .map(|player| PlayerSnapshot {
                id: player.id,
                position: player.position,
                facing: horizontal(player.look).unwrap_or(DVec3::ZERO),
                speed: player.speed.unwrap_or(tuning.default_player_speed),
                eligible: player.interactable
                    && !player.is_afk(now, tuning.afk_threshold_ms),
            })
            .collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));

        Self { snapshots }
    }

    /// Snapshot of an eligible player. Ineligible players read as missing.
    pub fn get(&self, id: &PlayerId) -> Option<&PlayerSnapshot> {
        self.snapshots
            .binary_search_by(|s| s.id.cmp(id))
            .ok()
            .map(|idx| &self.snapshots[idx])
            .filter(|s| s.eligible)
    }

    pub fn eligible(&self) -> impl Iterator<Item = &PlayerSnapshot> {
        self.snapshots.iter().filter(|s| s.eligible)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl SpatialQuery for PlayerSnapshotCache {
    fn players_near(&self, point: DVec3, radius: f64) -> Vec<&PlayerSnapshot> {
        self.eligible()
            .filter(|s| s.position.distance(point) <= radius)
            .collect()
    }
}
