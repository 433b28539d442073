//! Async fixed-rate loop and the handle network code talks to

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::config::Config;
use crate::util::time::{tick_duration, Clock};
use crate::world::Terrain;

use super::events::{self, EventSender, InboundEvent, SimError};
use super::scheduler::TickScheduler;
use super::sinks::{BroadcastSink, OutboundEvent};
use super::stats::StatsSummary;

/// Summary published after every tick
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimStatus {
    pub tick: u64,
    pub cubes: usize,
    pub players: usize,
    pub charging: usize,
    pub hit_debug: bool,
    pub stats: StatsSummary,
}

/// Handle to a running simulation
#[derive(Clone)]
pub struct SimulationHandle {
    pub events: EventSender,
    pub outbound: broadcast::Sender<OutboundEvent>,
    pub status: Arc<RwLock<SimStatus>>,
}

impl SimulationHandle {
    pub fn send(&self, event: InboundEvent) -> Result<(), SimError> {
        self.events.try_send(event)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutboundEvent> {
        self.outbound.subscribe()
    }

    pub fn status(&self) -> SimStatus {
        self.status.read().clone()
    }
}

/// The authoritative simulation task
pub struct Simulation<T, C> {
    scheduler: TickScheduler<T, C, BroadcastSink>,
    status: Arc<RwLock<SimStatus>>,
    tick_rate: u32,
}

impl<T, C> Simulation<T, C>
where
    T: Terrain,
    C: Clock,
{
    /// Create the simulation and its handle
    pub fn new(config: &Config, terrain: T, clock: C) -> (Self, SimulationHandle) {
        let (events, inbound) = events::channel(config.sim.event_queue_capacity);
        let (outbound, _) = broadcast::channel(config.sim.outbound_capacity.max(1));
        let status = Arc::new(RwLock::new(SimStatus {
            hit_debug: config.sim.hit_debug,
            ..SimStatus::default()
        }));

        let handle = SimulationHandle {
            events,
            outbound: outbound.clone(),
            status: status.clone(),
        };

        let scheduler = TickScheduler::new(
            config.sim.clone(),
            config.tuning.clone(),
            terrain,
            clock,
            BroadcastSink::new(outbound),
            inbound,
        );

        let simulation = Self {
            scheduler,
            status,
            tick_rate: config.sim.tick_rate,
        };

        (simulation, handle)
    }

    /// Run the fixed-rate tick loop until every handle is dropped
    pub async fn run(mut self) {
        info!(tick_rate = self.tick_rate, "Simulation started");

        let mut tick_interval = interval(tick_duration(self.tick_rate));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            self.scheduler.run_tick();
            self.publish_status();

            if self.scheduler.inbound_closed() {
                info!(tick = self.scheduler.tick(), "Simulation stopped");
                break;
            }
        }
    }

    fn publish_status(&self) {
        let s = &self.scheduler;
        let mut status = self.status.write();
        status.tick = s.tick();
        status.cubes = s.cubes().len();
        status.players = s.roster().len();
        status.charging = s.charging_players();
        status.hit_debug = s.hit_debug();
        status.stats = s.stats().summary();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::physics::CubeId;
    use crate::util::time::SystemClock;
    use crate::world::FreeSpace;
    use glam::DVec3;
    use std::time::Duration;
    use tokio::time::timeout;

    fn test_config() -> Config {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.sim.tick_rate = 100;
        config
    }

    #[tokio::test]
    async fn test_spawn_reaches_subscribers() {
        let (simulation, handle) = Simulation::new(&test_config(), FreeSpace, SystemClock);
        let mut rx = handle.subscribe();
        let task = tokio::spawn(simulation.run());

        handle
            .send(InboundEvent::SpawnCube {
                position: DVec3::new(0.0, 64.0, 0.0),
                requested_by: None,
            })
            .unwrap();

        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no event within timeout")
            .unwrap();
        assert_eq!(
            event,
            OutboundEvent::CubeSpawned {
                cube: CubeId(1),
                position: DVec3::new(0.0, 64.0, 0.0),
            }
        );

        // Status is published after the tick that spawned the cube
        timeout(Duration::from_secs(2), async {
            while handle.status().cubes != 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("status never showed the cube");

        drop(handle);
        timeout(Duration::from_secs(2), task)
            .await
            .expect("simulation did not stop")
            .unwrap();
    }
}
