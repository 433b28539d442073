//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::physics::kick::SoftCapPolicy;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated)
    pub client_origin: String,
    /// Simulation loop settings
    pub sim: SimConfig,
    /// Physics constants consumed by the resolver
    pub tuning: PhysicsTuning,
}

/// Settings for the fixed-timestep loop and its queues
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Ticks per second
    pub tick_rate: u32,
    /// A tick slower than this is reported as over budget
    pub tick_budget_ms: u64,
    /// Capacity of the inbound event queue
    pub event_queue_capacity: usize,
    /// Capacity of the outbound broadcast channel
    pub outbound_capacity: usize,
    /// Seed for the kick soft-cap RNG
    pub seed: u64,
    /// Debug verbosity for observability signals
    pub hit_debug: bool,
    /// Ticks between a cube being marked dead and its removal
    pub removal_delay_ticks: u64,
    /// Ticks between touch-ledger sweeps
    pub sweep_interval_ticks: u64,
    /// Minimum time between two spawn requests from the same player
    pub spawn_cooldown_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            tick_budget_ms: 5,
            event_queue_capacity: 1024,
            outbound_capacity: 256,
            seed: 0x5eed,
            hit_debug: false,
            removal_delay_ticks: 20,
            sweep_interval_ticks: 20,
            spawn_cooldown_ms: 3_000,
        }
    }
}

/// Tunable physics constants.
///
/// Distances are in blocks, speeds in blocks per tick, durations in
/// milliseconds. None of these are re-derived at runtime.
#[derive(Clone, Debug)]
pub struct PhysicsTuning {
    // --- Kick power & charge ---
    pub max_kick_power: f64,
    pub soft_cap_min_factor: f64,
    pub soft_cap: SoftCapPolicy,
    pub charge_multiplier: f64,
    pub charged_base_power: f64,
    pub regular_base_power: f64,
    pub kick_speed_multiplier: f64,
    pub kick_vertical_boost: f64,
    pub cube_rise_impulse: f64,
    /// Speed assumed for a kicking player that has not moved yet
    pub default_kick_speed: f64,
    pub charge_base_value: f64,
    pub charge_recovery_rate: f64,

    // --- Cooldowns ---
    pub regular_kick_cooldown_ms: u64,
    pub charged_kick_cooldown_ms: u64,
    pub rise_cooldown_ms: u64,
    pub afk_threshold_ms: u64,
    /// A rise keeps the hover nudge off for this long
    pub lift_grace_ms: u64,
    /// Lift stamps older than this are cleared by the sweep
    pub lift_retention_ms: u64,

    // --- Players ---
    /// Speed assumed in the snapshot for a player that has not moved yet
    pub default_player_speed: f64,

    // --- Proximity & collision ---
    pub hit_radius: f64,
    pub min_radius: f64,
    pub interaction_radius: f64,
    pub hover_radius: f64,
    pub min_speed_for_dampening: f64,
    pub velocity_dampening_factor: f64,
    pub low_velocity_threshold: f64,
    pub low_velocity_push_multiplier: f64,
    pub player_speed_touch_divisor: f64,
    pub cube_speed_touch_divisor: f64,
    pub min_sound_power: f64,
    pub wall_bounce_factor: f64,
    pub bounce_threshold: f64,
    pub air_drag_factor: f64,
    pub vector_change_threshold: f64,
    pub vertical_bounce_threshold: f64,
    pub min_bounce_velocity_y: f64,
    pub proximity_threshold_multiplier: f64,
    pub anti_clip_dot_threshold: f64,

    // --- Sound ---
    pub sound_volume: f32,
    pub sound_pitch: f32,
    pub kick_sound_volume: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        let hit_radius = 1.2;
        Self {
            max_kick_power: 5.0,
            soft_cap_min_factor: 0.9,
            soft_cap: SoftCapPolicy::Randomized,
            charge_multiplier: 7.0,
            charged_base_power: 0.375,
            regular_base_power: 0.65,
            kick_speed_multiplier: 2.0,
            kick_vertical_boost: 0.3,
            cube_rise_impulse: 0.7,
            default_kick_speed: 0.5,
            charge_base_value: 1.0,
            charge_recovery_rate: 0.945,

            regular_kick_cooldown_ms: 150,
            charged_kick_cooldown_ms: 500,
            rise_cooldown_ms: 500,
            afk_threshold_ms: 60_000,
            lift_grace_ms: 500,
            lift_retention_ms: 1_000,

            default_player_speed: 1.0,

            hit_radius,
            min_radius: 0.8,
            interaction_radius: hit_radius * 3.0,
            hover_radius: hit_radius * 2.0,
            min_speed_for_dampening: 0.5,
            velocity_dampening_factor: 0.5,
            low_velocity_threshold: 0.2,
            low_velocity_push_multiplier: 1.2,
            player_speed_touch_divisor: 3.0,
            cube_speed_touch_divisor: 6.0,
            min_sound_power: 0.15,
            wall_bounce_factor: 0.8,
            bounce_threshold: 0.3,
            air_drag_factor: 0.98,
            vector_change_threshold: 0.1,
            vertical_bounce_threshold: 0.05,
            min_bounce_velocity_y: 0.05,
            proximity_threshold_multiplier: 1.3,
            anti_clip_dot_threshold: 0.0,

            sound_volume: 0.5,
            sound_pitch: 1.0,
            kick_sound_volume: 0.75,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Some(port) = lookup("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string())
        };

        let defaults = SimConfig::default();
        let sim = SimConfig {
            tick_rate: parse_or(&lookup, "TICK_RATE", defaults.tick_rate)?,
            tick_budget_ms: parse_or(&lookup, "TICK_BUDGET_MS", defaults.tick_budget_ms)?,
            event_queue_capacity: parse_or(
                &lookup,
                "EVENT_QUEUE_CAPACITY",
                defaults.event_queue_capacity,
            )?,
            seed: parse_or(&lookup, "SIM_SEED", defaults.seed)?,
            hit_debug: parse_or(&lookup, "HIT_DEBUG", defaults.hit_debug)?,
            ..defaults
        };
        if sim.tick_rate == 0 {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }
        if sim.event_queue_capacity == 0 {
            return Err(ConfigError::Invalid("EVENT_QUEUE_CAPACITY"));
        }

        let base = PhysicsTuning::default();
        let hit_radius = parse_or(&lookup, "HIT_RADIUS", base.hit_radius)?;
        let tuning = PhysicsTuning {
            max_kick_power: parse_or(&lookup, "MAX_KICK_POWER", base.max_kick_power)?,
            soft_cap: parse_or(&lookup, "KICK_SOFT_CAP", base.soft_cap)?,
            min_radius: parse_or(&lookup, "MIN_RADIUS", base.min_radius)?,
            interaction_radius: hit_radius * 3.0,
            hover_radius: hit_radius * 2.0,
            hit_radius,
            ..base
        };
        if tuning.max_kick_power.is_nan() || tuning.max_kick_power <= 0.0 {
            return Err(ConfigError::Invalid("MAX_KICK_POWER"));
        }
        if tuning.min_radius <= 0.0 || tuning.min_radius > tuning.hit_radius {
            return Err(ConfigError::Invalid("MIN_RADIUS"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            sim,
            tuning,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
