//! Per-cube, per-tick velocity resolution

use std::collections::HashMap;

use glam::DVec3;

use crate::config::PhysicsTuning;
use crate::world::SpatialQuery;

use super::formulae::{
    horizontal, perpendicular_distance, touch_distance, within_band, TOUCH_SLACK,
};
use super::kick::{KickPowerCalculator, KickResult, KickTuning};
use super::touch::{TouchDebounce, TouchType};
use super::{Cube, CubeId, PlayerId};

/// Resolution errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("{cube} has a non-finite position or velocity")]
    NonFinite { cube: CubeId },
}

/// What happened to one cube during a tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveOutcome {
    /// Players that pushed the cube this tick
    pub touched_by: Vec<PlayerId>,
    /// An impact sound should play at the cube
    pub play_sound: bool,
    /// Factor applied by the anti-clip pass
    pub clip_factor: Option<f64>,
    /// Speed before the cap, when it was exceeded
    pub capped_from: Option<f64>,
}

/// Player trying to kick or lift a cube
#[derive(Debug, Clone, Copy)]
pub struct Gesture {
    pub player: PlayerId,
    pub look: DVec3,
    /// Recent speed, `None` until the player has moved
    pub speed: Option<f64>,
    /// Current charge, `None` when not charging
    pub charge: Option<f64>,
}

/// A player near the cube this tick
struct Interaction {
    position: DVec3,
    distance: f64,
}

/// Integrates cube velocities against the player snapshot.
///
/// Owns the previous velocity of every cube it has seen. Cube velocity is only
/// ever written here, by [`resolve`](Self::resolve) or one of the gestures.
pub struct CollisionResolver {
    tuning: PhysicsTuning,
    previous: HashMap<CubeId, DVec3>,
    kicks: KickPowerCalculator,
}

impl CollisionResolver {
    pub fn new(tuning: PhysicsTuning, seed: u64) -> Self {
        let kicks = KickPowerCalculator::new(KickTuning::from(&tuning), tuning.soft_cap, seed);
        Self {
            tuning,
            previous: HashMap::new(),
            kicks,
        }
    }

    pub fn tuning(&self) -> &PhysicsTuning {
        &self.tuning
    }

    /// Velocity committed for a cube on its last resolution
    pub fn previous_velocity(&self, cube: CubeId) -> Option<DVec3> {
        self.previous.get(&cube).copied()
    }

    /// Drop tracked state for a removed cube
    pub fn forget(&mut self, cube: CubeId) {
        self.previous.remove(&cube);
    }

    /// Resolve one live cube for this tick
    pub fn resolve<S>(
        &mut self,
        cube: &mut Cube,
        players: &S,
        touches: &mut TouchDebounce,
        now: u64,
    ) -> Result<ResolveOutcome, ResolveError>
    where
        S: SpatialQuery + ?Sized,
    {
        if !cube.is_finite() {
            return Err(ResolveError::NonFinite { cube: cube.id });
        }

        let t = &self.tuning;
        let previous = *self.previous.entry(cube.id).or_insert(cube.velocity);
        let mut velocity = cube.velocity;
        let mut outcome = ResolveOutcome::default();
        let mut interactions = Vec::new();

        // Proximity push
        for player in players.players_near(cube.position, t.interaction_radius) {
            let distance = touch_distance(cube.position, player.position);
            interactions.push(Interaction {
                position: player.position,
                distance,
            });
            if distance >= t.hit_radius {
                continue;
            }

            let speed = velocity.length();
            if distance < t.min_radius && speed > t.min_speed_for_dampening {
                velocity *= t.velocity_dampening_factor;
            }

            let impact = player.speed / t.player_speed_touch_divisor
                + previous.length().max(t.vector_change_threshold) / t.cube_speed_touch_divisor;
            let mut push = player.facing * impact;
            if speed < t.low_velocity_threshold {
                push *= t.low_velocity_push_multiplier;
            }
            velocity += push;

            touches.record(player.id, TouchType::RegularKick, now);
            outcome.touched_by.push(player.id);
            if impact > t.min_sound_power {
                outcome.play_sound = true;
            }
        }
        let touched = !outcome.touched_by.is_empty();

        // Walls and drag
        velocity.x = self.bounce_or_drag(velocity.x, previous.x, touched, cube.resting, &mut outcome);
        velocity.z = self.bounce_or_drag(velocity.z, previous.z, touched, cube.resting, &mut outcome);

        // Floor bounce and hover
        if velocity.y < 0.0
            && previous.y < 0.0
            && previous.y < velocity.y - t.vertical_bounce_threshold
        {
            velocity.y = -previous.y * t.wall_bounce_factor;
            if previous.y.abs() > t.bounce_threshold {
                outcome.play_sound = true;
            }
        } else if cube.resting && !cube.recently_lifted(now, t.lift_grace_ms) {
            let hover = self.hover(&interactions);
            if velocity.y < hover {
                velocity.y = hover;
            }
        }

        // Anti-clip
        let speed = velocity.length();
        if speed > t.vector_change_threshold {
            let projected = cube.position + velocity;
            let direction = horizontal(velocity);
            let mut smallest: Option<f64> = None;

            // A fast cube can reach players beyond the interaction radius
            let reach = speed * t.proximity_threshold_multiplier + TOUCH_SLACK;
            let wider;
            let candidates = if reach > t.interaction_radius {
                wider = players
                    .players_near(cube.position, reach)
                    .into_iter()
                    .map(|p| Interaction {
                        position: p.position,
                        distance: touch_distance(cube.position, p.position),
                    })
                    .collect::<Vec<_>>();
                &wider
            } else {
                &interactions
            };

            for interaction in candidates {
                if interaction.distance >= speed * t.proximity_threshold_multiplier {
                    continue;
                }
                let player_y = interaction.position.y;
                if !within_band(cube.position.y, player_y) && !within_band(projected.y, player_y) {
                    continue;
                }
                let on_line = perpendicular_distance(velocity, cube.position, interaction.position)
                    .map(|d| d < t.min_radius)
                    .unwrap_or(false);
                if !on_line {
                    continue;
                }
                let approaching = match (direction, horizontal(interaction.position - cube.position)) {
                    (Some(travel), Some(to_player)) => travel.dot(to_player) > t.anti_clip_dot_threshold,
                    _ => false,
                };
                if approaching {
                    let factor = interaction.distance / speed;
                    smallest = Some(smallest.map_or(factor, |s: f64| s.min(factor)));
                }
            }

            if let Some(factor) = smallest.filter(|f| *f < 1.0) {
                velocity *= factor;
                outcome.clip_factor = Some(factor);
            }
        }

        // Speed cap
        let speed = velocity.length();
        if speed > t.max_kick_power {
            velocity *= t.max_kick_power / speed;
            outcome.capped_from = Some(speed);
        }

        cube.velocity = velocity;
        self.previous.insert(cube.id, velocity);
        Ok(outcome)
    }

    /// Kick a cube. Returns `None` when the debounce rejects it.
    pub fn apply_kick(
        &mut self,
        cube: &mut Cube,
        gesture: &Gesture,
        touches: &mut TouchDebounce,
        now: u64,
    ) -> Option<KickResult> {
        let touch_type = if gesture.charge.is_some() {
            TouchType::ChargedKick
        } else {
            TouchType::RegularKick
        };
        if !touches.record(gesture.player, touch_type, now) {
            return None;
        }

        let speed = gesture.speed.unwrap_or(self.tuning.default_kick_speed);
        let result = self.kicks.kick(
            speed,
            gesture.charge.is_some(),
            gesture.charge.unwrap_or(0.0),
        );

        let mut impulse = gesture.look.normalize_or_zero() * result.final_kick_power;
        impulse.y = self.tuning.kick_vertical_boost;
        cube.velocity += impulse;
        Some(result)
    }

    /// Lift a cube. Returns false when the debounce rejects it.
    pub fn apply_rise(
        &mut self,
        cube: &mut Cube,
        gesture: &Gesture,
        touches: &mut TouchDebounce,
        now: u64,
    ) -> bool {
        if !touches.record(gesture.player, TouchType::Rise, now) {
            return false;
        }
        cube.velocity.y += self.tuning.cube_rise_impulse;
        cube.lifted_at = Some(now);
        true
    }

    fn bounce_or_drag(
        &self,
        current: f64,
        previous: f64,
        touched: bool,
        resting: bool,
        outcome: &mut ResolveOutcome,
    ) -> f64 {
        let t = &self.tuning;
        if current == 0.0 {
            if previous.abs() > t.bounce_threshold {
                outcome.play_sound = true;
            }
            -previous * t.wall_bounce_factor
        } else if !touched && !resting && (previous - current).abs() < t.vector_change_threshold {
            previous * t.air_drag_factor
        } else {
            current
        }
    }

    fn hover(&self, interactions: &[Interaction]) -> f64 {
        let t = &self.tuning;
        let floor = t.min_bounce_velocity_y * 0.4;
        interactions
            .iter()
            .map(|i| i.distance)
            .min_by(|a, b| a.total_cmp(b))
            .filter(|closest| *closest < t.hover_radius)
            .map(|closest| (t.min_bounce_velocity_y * (1.0 - closest / t.hover_radius)).max(floor))
            .unwrap_or(floor)
    }
}
