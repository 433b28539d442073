//! Box-shaped arena terrain

use glam::DVec3;

use crate::physics::Cube;

use super::Terrain;

/// Closed box with a floor, walls and a ceiling.
///
/// Stands in for the host engine's world movement: the cube moves by its
/// velocity and a blocked axis loses its velocity component. Gravity and
/// vertical drag apply afterwards, on the ground too.
#[derive(Debug, Clone)]
pub struct ArenaTerrain {
    pub min: DVec3,
    pub max: DVec3,
    /// Half size of a cube
    pub cube_radius: f64,
    pub gravity: f64,
    pub vertical_drag: f64,
    /// Horizontal velocity multiplier while on the ground
    pub ground_friction: f64,
}

impl ArenaTerrain {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self {
            min,
            max,
            cube_radius: 0.25,
            gravity: 0.08,
            vertical_drag: 0.98,
            ground_friction: 0.95,
        }
    }

    /// Default pitch: 60 x 20 x 40 blocks with the floor at y = 64
    pub fn pitch() -> Self {
        Self::new(DVec3::new(-30.0, 64.0, -20.0), DVec3::new(30.0, 84.0, 20.0))
    }

    /// Clamp a spawn position into the arena
    pub fn clamp(&self, point: DVec3) -> DVec3 {
        let r = DVec3::splat(self.cube_radius);
        point.clamp(self.min + r, self.max - r)
    }
}

/// Move one axis. Returns the new coordinate and whether it was blocked,
/// negative for the low side.
fn move_axis(position: f64, velocity: f64, low: f64, high: f64) -> (f64, i8) {
    let next = position + velocity;
    if next < low {
        (low, -1)
    } else if next > high {
        (high, 1)
    } else {
        (next, 0)
    }
}

impl Terrain for ArenaTerrain {
    fn spawn_point(&self, requested: DVec3) -> DVec3 {
        self.clamp(requested)
    }

    fn advance(&self, cube: &mut Cube) {
        let low = self.min + DVec3::splat(self.cube_radius);
        let high = self.max - DVec3::splat(self.cube_radius);

        let (x, blocked_x) = move_axis(cube.position.x, cube.velocity.x, low.x, high.x);
        let (y, blocked_y) = move_axis(cube.position.y, cube.velocity.y, low.y, high.y);
        let (z, blocked_z) = move_axis(cube.position.z, cube.velocity.z, low.z, high.z);
        cube.position = DVec3::new(x, y, z);

        if blocked_x != 0 {
            cube.velocity.x = 0.0;
        }
        if blocked_z != 0 {
            cube.velocity.z = 0.0;
        }
        if blocked_y != 0 {
            cube.velocity.y = 0.0;
        }

        cube.resting = blocked_y < 0;
        if cube.resting {
            cube.velocity.x *= self.ground_friction;
            cube.velocity.z *= self.ground_friction;
        }
        // Gravity keeps pulling on the ground, leaving a small downward velocity
        cube.velocity.y = (cube.velocity.y - self.gravity) * self.vertical_drag;
    }
}

/// Unbounded empty space: no gravity, no walls, never resting
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeSpace;

impl Terrain for FreeSpace {
    fn advance(&self, cube: &mut Cube) {
        cube.position += cube.velocity;
        cube.resting = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::CubeId;

    fn cube_at(position: DVec3, velocity: DVec3) -> Cube {
        let mut cube = Cube::new(CubeId(1), position);
        cube.velocity = velocity;
        cube
    }

    #[test]
    fn test_wall_blocks_axis() {
        let arena = ArenaTerrain::pitch();
        let mut cube = cube_at(DVec3::new(29.5, 70.0, 0.0), DVec3::new(0.6, 0.0, 0.2));
        arena.advance(&mut cube);

        assert_eq!(cube.velocity.x, 0.0);
        assert!((cube.velocity.z - 0.2).abs() < 1e-12);
        assert!((cube.position.x - 29.75).abs() < 1e-12);
        assert!(!cube.resting);
    }

    #[test]
    fn test_floor_contact_sets_resting() {
        let arena = ArenaTerrain::pitch();
        let mut cube = cube_at(DVec3::new(0.0, 64.3, 0.0), DVec3::new(1.0, -0.2, 0.0));
        arena.advance(&mut cube);

        assert!(cube.resting);
        assert!((cube.velocity.y + 0.08 * 0.98).abs() < 1e-12);
        assert!((cube.position.y - 64.25).abs() < 1e-12);
        assert!((cube.velocity.x - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_gravity_in_air() {
        let arena = ArenaTerrain::pitch();
        let mut cube = cube_at(DVec3::new(0.0, 70.0, 0.0), DVec3::ZERO);
        arena.advance(&mut cube);
        assert!((cube.velocity.y + 0.08 * 0.98).abs() < 1e-12);
        assert!(!cube.resting);
    }

    #[test]
    fn test_spawn_point_clamped_inside() {
        let arena = ArenaTerrain::pitch();
        assert_eq!(
            arena.spawn_point(DVec3::new(100.0, 0.0, 0.0)),
            DVec3::new(29.75, 64.25, 0.0)
        );
        assert_eq!(
            arena.spawn_point(DVec3::new(3.0, 70.0, -4.0)),
            DVec3::new(3.0, 70.0, -4.0)
        );
        assert_eq!(FreeSpace.spawn_point(DVec3::splat(500.0)), DVec3::splat(500.0));
    }

    #[test]
    fn test_free_space_moves_only() {
        let mut cube = cube_at(DVec3::ZERO, DVec3::new(1.0, 2.0, 3.0));
        FreeSpace.advance(&mut cube);
        assert_eq!(cube.position, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(cube.velocity, DVec3::new(1.0, 2.0, 3.0));
    }
}
