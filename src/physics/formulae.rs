//! Distance helpers shared by the resolver

use glam::DVec3;

/// Height of a player's collision band above their feet
pub const HEAD_BAND: f64 = 2.0;
/// Depth of a player's collision band below their feet
pub const FOOT_BAND: f64 = 1.0;

/// Half the height of a player's collision band
const BODY_HALF_HEIGHT: f64 = 1.25;

/// Most a straight-line distance can exceed [`touch_distance`] for the same
/// cube and player
pub const TOUCH_SLACK: f64 = 2.0 * BODY_HALF_HEIGHT;

/// Slopes flatter than this on the X axis have no usable travel line
const MIN_LINE_RUN: f64 = 1e-6;

/// Distance between a cube and a player body.
///
/// Horizontal components are plain absolute differences. Vertically the
/// player occupies a band around their feet, so anything inside the band
/// counts as 0.
pub fn touch_distance(cube: DVec3, player: DVec3) -> f64 {
    let dx = (cube.x - player.x).abs();
    let dz = (cube.z - player.z).abs();
    let dy = (((cube.y - 1.0) - player.y - 0.25).abs() - BODY_HALF_HEIGHT).max(0.0);
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Distance from a player to the horizontal line the cube travels on.
///
/// Returns `None` when the velocity has no usable X component.
pub fn perpendicular_distance(velocity: DVec3, cube: DVec3, player: DVec3) -> Option<f64> {
    if velocity.x.abs() < MIN_LINE_RUN {
        return None;
    }
    let a = velocity.z / velocity.x;
    let b = cube.z - a * cube.x;
    Some((a * player.x - player.z + b).abs() / (a * a + 1.0).sqrt())
}

/// Whether a height lies strictly inside a player's collision band
pub fn within_band(y: f64, player_y: f64) -> bool {
    y > player_y - FOOT_BAND && y < player_y + HEAD_BAND
}

/// Drop the vertical component and re-normalize.
/// Returns `None` for a vector pointing straight up or down.
pub fn horizontal(v: DVec3) -> Option<DVec3> {
    DVec3::new(v.x, 0.0, v.z).try_normalize()
}
