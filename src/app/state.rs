//! Application state shared across routes

use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use uuid::Uuid;

use crate::config::Config;
use crate::sim::SimulationHandle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sim: SimulationHandle,
    /// Last accepted spawn request per player, in unix millis
    pub spawn_cooldowns: Arc<DashMap<Uuid, u64>>,
}

impl AppState {
    pub fn new(config: Config, sim: SimulationHandle) -> Self {
        Self {
            config: Arc::new(config),
            sim,
            spawn_cooldowns: Arc::new(DashMap::new()),
        }
    }

    /// Accept a spawn request from `player` or return the millis left to wait
    pub fn check_spawn_cooldown(&self, player: Uuid, now: u64) -> Result<(), u64> {
        let cooldown = self.config.sim.spawn_cooldown_ms;

        match self.spawn_cooldowns.entry(player) {
            Entry::Occupied(mut entry) => {
                let elapsed = now.saturating_sub(*entry.get());
                if elapsed < cooldown {
                    return Err(cooldown - elapsed);
                }
                entry.insert(now);
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
            }
        }

        // Expired entries no longer block anyone
        self.spawn_cooldowns
            .retain(|_, last| now.saturating_sub(*last) < cooldown);
        Ok(())
    }
}
