//! Collaborator seams between the physics core and the host world

pub mod arena;
pub mod roster;

use glam::DVec3;

use crate::physics::{Cube, PlayerId, PlayerSnapshot};

pub use crate::util::time::{Clock, ManualClock, SystemClock};
pub use arena::{ArenaTerrain, FreeSpace};
pub use roster::{PlayerRecord, PlayerRoster};

/// Source of every connected player
pub trait PlayerDirectory {
    fn players(&self) -> Vec<&PlayerRecord>;

    fn contains(&self, id: &PlayerId) -> bool;
}

/// Nearby eligible players around a point
pub trait SpatialQuery {
    fn players_near(&self, point: DVec3, radius: f64) -> Vec<&PlayerSnapshot>;
}

/// Host engine movement for cubes.
///
/// Moves the cube by its velocity, zeroes any velocity component whose axis
/// was blocked, sets `resting` on ground contact and applies gravity.
pub trait Terrain: Send {
    /// Where a cube requested at `requested` actually appears
    fn spawn_point(&self, requested: DVec3) -> DVec3 {
        requested
    }

    fn advance(&self, cube: &mut Cube);
}
