//! Cube entities and their owned registry

use std::collections::BTreeMap;
use std::fmt;

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Handle into the [`CubeRegistry`]. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CubeId(pub u64);

impl fmt::Display for CubeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cube-{}", self.0)
    }
}

/// A ball in the world
#[derive(Debug, Clone, PartialEq)]
pub struct Cube {
    pub id: CubeId,
    pub position: DVec3,
    pub velocity: DVec3,
    /// Set by the terrain when the cube touches the ground
    pub resting: bool,
    /// Time of the last accepted rise gesture
    pub lifted_at: Option<u64>,
    pub alive: bool,
}

impl Cube {
    pub fn new(id: CubeId, position: DVec3) -> Self {
        Self {
            id,
            position,
            velocity: DVec3::ZERO,
            resting: false,
            lifted_at: None,
            alive: true,
        }
    }

    pub fn speed(&self) -> f64 {
        self.velocity.length()
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }

    /// Whether a rise happened less than `grace_ms` ago
    pub fn recently_lifted(&self, now: u64, grace_ms: u64) -> bool {
        self.lifted_at
            .map(|at| now.saturating_sub(at) < grace_ms)
            .unwrap_or(false)
    }
}

/// Owner of every cube. Iteration is in id order.
#[derive(Debug, Default)]
pub struct CubeRegistry {
    cubes: BTreeMap<CubeId, Cube>,
    next_id: u64,
}

impl CubeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, position: DVec3) -> CubeId {
        self.next_id += 1;
        let id = CubeId(self.next_id);
        self.cubes.insert(id, Cube::new(id, position));
        id
    }

    pub fn get(&self, id: CubeId) -> Option<&Cube> {
        self.cubes.get(&id)
    }

    pub fn get_mut(&mut self, id: CubeId) -> Option<&mut Cube> {
        self.cubes.get_mut(&id)
    }

    pub fn remove(&mut self, id: CubeId) -> Option<Cube> {
        self.cubes.remove(&id)
    }

    /// Flag a cube dead. Returns false if it was unknown or already dead.
    pub fn mark_dead(&mut self, id: CubeId) -> bool {
        match self.cubes.get_mut(&id) {
            Some(cube) if cube.alive => {
                cube.alive = false;
                true
            }
            _ => false,
        }
    }

    pub fn ids(&self) -> Vec<CubeId> {
        self.cubes.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cube> {
        self.cubes.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Cube> {
        self.cubes.values_mut()
    }

    pub fn len(&self) -> usize {
        self.cubes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cubes.is_empty()
    }
}
