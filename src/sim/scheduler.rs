//! One deterministic pass over every cube per tick

use std::panic::{catch_unwind, AssertUnwindSafe};

use glam::DVec3;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info, warn};

use crate::config::{PhysicsTuning, SimConfig};
use crate::physics::collision::Gesture;
use crate::physics::touch::{TouchCooldowns, TouchType};
use crate::physics::{
    ChargeAccumulator, CollisionResolver, CubeId, CubeRegistry, PlayerId, PlayerSnapshotCache,
    TouchDebounce,
};
use crate::util::time::{Clock, Timer};
use crate::world::{PlayerDirectory, PlayerRoster, Terrain};

use super::events::InboundEvent;
use super::sinks::{
    IndicatorSink, LifecycleSink, ObservabilitySink, Outbound, Signal, SoundEvent, SoundId,
    SoundSink, SoundTarget,
};
use super::stats::TickStats;

/// Side effect held back until the cube pass is over
#[derive(Debug, Clone)]
enum Effect {
    Sound(SoundEvent),
    Spawned(CubeId, DVec3),
    RemovalScheduled(CubeId, u64),
    Removed(CubeId),
    Charge(PlayerId, f64),
    Signal(Signal),
}

/// Owns the world and advances it one fixed step at a time
pub struct TickScheduler<T, C, O> {
    config: SimConfig,
    terrain: T,
    clock: C,
    outbound: O,
    inbound: mpsc::Receiver<InboundEvent>,
    inbound_closed: bool,

    cubes: CubeRegistry,
    roster: PlayerRoster,
    charges: ChargeAccumulator,
    touches: TouchDebounce,
    resolver: CollisionResolver,

    tick: u64,
    hit_debug: bool,
    stats: TickStats,
    effects: Vec<Effect>,
    removals: Vec<(CubeId, u64)>,
}

impl<T, C, O> TickScheduler<T, C, O>
where
    T: Terrain,
    C: Clock,
    O: Outbound,
{
    pub fn new(
        config: SimConfig,
        tuning: PhysicsTuning,
        terrain: T,
        clock: C,
        outbound: O,
        inbound: mpsc::Receiver<InboundEvent>,
    ) -> Self {
        Self {
            hit_debug: config.hit_debug,
            charges: ChargeAccumulator::from_tuning(&tuning),
            touches: TouchDebounce::new(TouchCooldowns::from(&tuning)),
            resolver: CollisionResolver::new(tuning, config.seed),
            config,
            terrain,
            clock,
            outbound,
            inbound,
            inbound_closed: false,
            cubes: CubeRegistry::new(),
            roster: PlayerRoster::new(),
            tick: 0,
            stats: TickStats::new(),
            effects: Vec::new(),
            removals: Vec::new(),
        }
    }

    /// Run one full tick
    pub fn run_tick(&mut self) {
        let timer = Timer::new();
        self.tick += 1;
        let now = self.clock.now_millis();

        self.drain_events(now);
        self.advance_charges();
        self.move_cubes();

        let snapshot = PlayerSnapshotCache::build(&self.roster, now, self.resolver.tuning());
        self.resolve_cubes(&snapshot, now);

        self.complete_removals();
        self.flush();

        if self.tick % self.config.sweep_interval_ticks.max(1) == 0 {
            self.sweep(now);
        }

        let elapsed = timer.elapsed_micros();
        let budget = self.config.tick_budget_ms * 1_000;
        if self.stats.record(elapsed, budget) {
            warn!(
                tick = self.tick,
                elapsed_micros = elapsed,
                budget_micros = budget,
                "Tick over budget"
            );
            self.outbound.signal(Signal::TickOverBudget {
                tick: self.tick,
                elapsed_micros: elapsed,
                budget_micros: budget,
            });
        }
    }

    /// Drain every queued event, in arrival order
    fn drain_events(&mut self, now: u64) {
        loop {
            match self.inbound.try_recv() {
                Ok(event) => self.apply_event(event, now),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.inbound_closed = true;
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: InboundEvent, now: u64) {
        match event {
            InboundEvent::SpawnCube {
                position,
                requested_by,
            } => {
                let position = self.terrain.spawn_point(position);
                let id = self.cubes.spawn(position);
                info!(cube_id = %id, requested_by = ?requested_by, "Cube spawned");
                self.effects.push(Effect::Spawned(id, position));
            }
            InboundEvent::RemoveCube { cube } => {
                self.cubes.mark_dead(cube);
                if let Some(existing) = self.cubes.get(cube) {
                    if !existing.alive {
                        self.schedule_removal(cube);
                    }
                }
            }
            InboundEvent::PlayerJoined {
                player,
                position,
                look,
            } => {
                if self.roster.join(player, position, look, now) {
                    info!(player_id = %player, "Player joined");
                }
            }
            InboundEvent::PlayerMoved {
                player,
                position,
                look,
            } => {
                self.roster.move_to(&player, position, look, now);
            }
            InboundEvent::PlayerLeft { player } => {
                if self.roster.leave(&player).is_some() {
                    info!(player_id = %player, "Player left");
                }
                self.charges.end(&player);
                self.touches.forget(&player);
            }
            InboundEvent::SetInteractable {
                player,
                interactable,
            } => {
                self.roster.set_interactable(&player, interactable);
                if !interactable && self.charges.end(&player) {
                    self.effects.push(Effect::Charge(player, 0.0));
                }
            }
            InboundEvent::BeginCharge { player } => {
                if self.is_interactable(&player) {
                    self.charges.begin(player);
                    self.roster.record_action(&player, now);
                }
            }
            InboundEvent::EndCharge { player } => {
                if self.charges.end(&player) {
                    self.effects.push(Effect::Charge(player, 0.0));
                }
            }
            InboundEvent::Kick { player, cube } => self.kick(player, cube, now),
            InboundEvent::Rise { player, cube } => self.rise(player, cube, now),
            InboundEvent::SetHitDebug { enabled } => {
                info!(enabled, "Hit debug toggled");
                self.hit_debug = enabled;
            }
        }
    }

    fn is_interactable(&self, player: &PlayerId) -> bool {
        self.roster
            .get(player)
            .map(|p| p.interactable)
            .unwrap_or(false)
    }

    /// Gesture for an interactable player, `None` otherwise
    fn gesture(&self, player: &PlayerId) -> Option<Gesture> {
        let record = self.roster.get(player).filter(|p| p.interactable)?;
        Some(Gesture {
            player: record.id,
            look: record.look,
            speed: record.speed,
            charge: self
                .charges
                .is_charging(player)
                .then(|| self.charges.value(player)),
        })
    }

    fn kick(&mut self, player: PlayerId, cube_id: CubeId, now: u64) {
        let Some(gesture) = self.gesture(&player) else {
            return;
        };
        let Some(cube) = self.cubes.get_mut(cube_id).filter(|c| c.alive) else {
            return;
        };
        let Some(result) = self
            .resolver
            .apply_kick(cube, &gesture, &mut self.touches, now)
        else {
            debug!(player_id = %player, cube_id = %cube_id, "Kick debounced");
            return;
        };

        let tuning = self.resolver.tuning();
        self.effects.push(Effect::Sound(SoundEvent {
            target: SoundTarget::Location {
                position: cube.position,
            },
            sound: SoundId::CubeImpact,
            volume: tuning.kick_sound_volume,
            pitch: tuning.sound_pitch,
        }));
        self.effects.push(Effect::Sound(SoundEvent {
            target: SoundTarget::Player { player },
            sound: SoundId::KickConfirm,
            volume: tuning.sound_volume,
            pitch: tuning.sound_pitch,
        }));
        self.roster.record_action(&player, now);

        debug!(
            player_id = %player,
            cube_id = %cube_id,
            power = result.final_kick_power,
            charged = result.is_charged_hit,
            "Kick applied"
        );
        if self.hit_debug {
            let touch_type = if result.is_charged_hit {
                TouchType::ChargedKick
            } else {
                TouchType::RegularKick
            };
            self.effects.push(Effect::Signal(Signal::KickDebug {
                player,
                cube: cube_id,
                result,
                capped: result.was_capped(),
                cooldown_ms: self.touches.remaining(&player, touch_type, now),
            }));
        }
    }

    fn rise(&mut self, player: PlayerId, cube_id: CubeId, now: u64) {
        let Some(gesture) = self.gesture(&player) else {
            return;
        };
        let Some(cube) = self.cubes.get_mut(cube_id).filter(|c| c.alive) else {
            return;
        };
        if !self
            .resolver
            .apply_rise(cube, &gesture, &mut self.touches, now)
        {
            return;
        }

        let tuning = self.resolver.tuning();
        self.effects.push(Effect::Sound(SoundEvent {
            target: SoundTarget::Location {
                position: cube.position,
            },
            sound: SoundId::CubeImpact,
            volume: tuning.sound_volume,
            pitch: tuning.sound_pitch,
        }));
        self.roster.record_action(&player, now);
    }

    fn advance_charges(&mut self) {
        let roster = &self.roster;
        let effects = &mut self.effects;
        self.charges.advance(
            |id| roster.contains(id),
            |id, level| effects.push(Effect::Charge(id, level)),
        );
    }

    /// Host world movement for every live cube
    fn move_cubes(&mut self) {
        for cube in self.cubes.iter_mut().filter(|c| c.alive) {
            let id = cube.id;
            let terrain = &self.terrain;
            if catch_unwind(AssertUnwindSafe(|| terrain.advance(cube))).is_err() {
                error!(cube_id = %id, "Terrain movement panicked");
                self.effects.push(Effect::Signal(Signal::ResolutionFailed {
                    cube: id,
                    reason: "terrain movement panicked".to_string(),
                }));
            }
        }
    }

    fn resolve_cubes(&mut self, snapshot: &PlayerSnapshotCache, now: u64) {
        for id in self.cubes.ids() {
            let Some(cube) = self.cubes.get_mut(id) else {
                continue;
            };
            if !cube.alive {
                self.schedule_removal(id);
                continue;
            }

            let resolver = &mut self.resolver;
            let touches = &mut self.touches;
            let result = catch_unwind(AssertUnwindSafe(|| {
                resolver.resolve(&mut *cube, snapshot, touches, now)
            }));

            match result {
                Ok(Ok(outcome)) => {
                    if outcome.play_sound {
                        let tuning = self.resolver.tuning();
                        self.effects.push(Effect::Sound(SoundEvent {
                            target: SoundTarget::Location {
                                position: cube.position,
                            },
                            sound: SoundId::CubeImpact,
                            volume: tuning.sound_volume,
                            pitch: tuning.sound_pitch,
                        }));
                    }
                    if let Some(speed) = outcome.capped_from {
                        debug!(cube_id = %id, speed, "Cube speed capped");
                        if self.hit_debug {
                            self.effects.push(Effect::Signal(Signal::SpeedCapped {
                                cube: id,
                                speed,
                                max: self.resolver.tuning().max_kick_power,
                            }));
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!(cube_id = %id, error = %e, "Cube resolution failed");
                    self.effects.push(Effect::Signal(Signal::ResolutionFailed {
                        cube: id,
                        reason: e.to_string(),
                    }));
                }
                Err(_) => {
                    error!(cube_id = %id, "Cube resolution panicked");
                    self.effects.push(Effect::Signal(Signal::ResolutionFailed {
                        cube: id,
                        reason: "resolution panicked".to_string(),
                    }));
                }
            }
        }
    }

    fn schedule_removal(&mut self, cube: CubeId) {
        if self.removals.iter().any(|(id, _)| *id == cube) {
            return;
        }
        let remove_at = self.tick + self.config.removal_delay_ticks;
        debug!(cube_id = %cube, remove_at, "Cube removal scheduled");
        self.removals.push((cube, remove_at));
        self.effects.push(Effect::RemovalScheduled(cube, remove_at));
    }

    fn complete_removals(&mut self) {
        let tick = self.tick;
        let (due, pending): (Vec<_>, Vec<_>) = self
            .removals
            .drain(..)
            .partition(|(_, remove_at)| *remove_at <= tick);
        self.removals = pending;

        for (id, _) in due {
            if self.cubes.remove(id).is_some() {
                self.resolver.forget(id);
                info!(cube_id = %id, "Cube removed");
                self.effects.push(Effect::Removed(id));
            }
        }
    }

    /// Hand every buffered side effect to the outbound sinks
    fn flush(&mut self) {
        for effect in self.effects.drain(..) {
            match effect {
                Effect::Sound(sound) => self.outbound.play(sound),
                Effect::Spawned(id, position) => self.outbound.spawned(id, position),
                Effect::RemovalScheduled(id, at) => self.outbound.removal_scheduled(id, at),
                Effect::Removed(id) => self.outbound.removed(id),
                Effect::Charge(player, level) => self.outbound.charge_level(player, level),
                Effect::Signal(signal) => self.outbound.signal(signal),
            }
        }
    }

    /// Low-frequency cleanup of expired bookkeeping
    fn sweep(&mut self, now: u64) {
        let expired = self.touches.sweep(now);
        let retention = self.resolver.tuning().lift_retention_ms;
        for cube in self.cubes.iter_mut().filter(|c| c.alive) {
            if matches!(cube.lifted_at, Some(at) if now.saturating_sub(at) > retention) {
                cube.lifted_at = None;
            }
        }
        if expired > 0 {
            debug!(expired, "Touch records swept");
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn hit_debug(&self) -> bool {
        self.hit_debug
    }

    pub fn cubes(&self) -> &CubeRegistry {
        &self.cubes
    }

    pub fn roster(&self) -> &PlayerRoster {
        &self.roster
    }

    pub fn charging_players(&self) -> usize {
        self.charges.len()
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    pub fn outbound(&self) -> &O {
        &self.outbound
    }

    pub fn outbound_mut(&mut self) -> &mut O {
        &mut self.outbound
    }

    /// Every producer of inbound events is gone
    pub fn inbound_closed(&self) -> bool {
        self.inbound_closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{Cube, SoftCapPolicy};
    use crate::sim::events::{channel, EventSender};
    use crate::sim::sinks::{MemorySink, OutboundEvent};
    use crate::util::time::ManualClock;
    use crate::world::{ArenaTerrain, FreeSpace};
    use uuid::Uuid;

    type Sched<T> = TickScheduler<T, ManualClock, MemorySink>;

    fn scheduler_with<T: Terrain>(terrain: T) -> (Sched<T>, EventSender, ManualClock) {
        let (tx, rx) = channel(64);
        let clock = ManualClock::new(1_000_000);
        let tuning = PhysicsTuning {
            soft_cap: SoftCapPolicy::Deterministic,
            ..PhysicsTuning::default()
        };
        let config = SimConfig {
            tick_budget_ms: 1_000,
            ..SimConfig::default()
        };
        let scheduler = TickScheduler::new(
            config,
            tuning,
            terrain,
            clock.clone(),
            MemorySink::new(),
            rx,
        );
        (scheduler, tx, clock)
    }

    fn spawn(tx: &EventSender, position: DVec3) {
        tx.try_send(InboundEvent::SpawnCube {
            position,
            requested_by: None,
        })
        .unwrap();
    }

    fn join(tx: &EventSender, player: PlayerId, position: DVec3, look: DVec3) {
        tx.try_send(InboundEvent::PlayerJoined {
            player,
            position,
            look,
        })
        .unwrap();
    }

    fn cube(sched: &Sched<impl Terrain>, id: u64) -> &Cube {
        sched.cubes().get(CubeId(id)).unwrap()
    }

    fn kick_confirms(sink: &MemorySink) -> usize {
        sink.sounds()
            .iter()
            .filter(|s| s.sound == SoundId::KickConfirm)
            .count()
    }

    #[test]
    fn test_walk_into_cube_then_kick_debounced() {
        let (mut sched, tx, clock) = scheduler_with(FreeSpace);
        let player = Uuid::new_v4();

        spawn(&tx, DVec3::new(0.0, 64.25, 0.0));
        join(&tx, player, DVec3::new(-1.5, 64.0, 0.0), DVec3::X);
        tx.try_send(InboundEvent::PlayerMoved {
            player,
            position: DVec3::new(-0.5, 64.0, 0.0),
            look: DVec3::X,
        })
        .unwrap();
        sched.run_tick();

        let impact = 1.0 / 3.0 + 0.1 / 6.0;
        let ball = cube(&sched, 1);
        assert!((ball.velocity.x - impact * 1.2).abs() < 1e-9);
        assert_eq!(ball.velocity.z, 0.0);
        assert!(sched
            .touches
            .last(&player, TouchType::RegularKick)
            .is_some());
        assert_eq!(sched.outbound().sounds().len(), 1);

        clock.advance(50);
        tx.try_send(InboundEvent::Kick {
            player,
            cube: CubeId(1),
        })
        .unwrap();
        sched.run_tick();
        assert_eq!(kick_confirms(sched.outbound()), 0);
    }

    #[test]
    fn test_kick_applies_impulse_and_sounds() {
        let (mut sched, tx, clock) = scheduler_with(FreeSpace);
        let player = Uuid::new_v4();
        spawn(&tx, DVec3::new(0.0, 64.25, 0.0));
        join(&tx, player, DVec3::new(10.0, 64.0, 0.0), DVec3::X);
        sched.run_tick();
        sched.outbound_mut().clear();

        tx.try_send(InboundEvent::Kick {
            player,
            cube: CubeId(1),
        })
        .unwrap();
        sched.run_tick();

        let ball = cube(&sched, 1);
        assert!((ball.velocity.x - 1.65).abs() < 1e-9);
        assert!((ball.velocity.y - 0.3).abs() < 1e-9);

        let sounds = sched.outbound().sounds();
        assert_eq!(sounds.len(), 2);
        assert_eq!(sounds[0].sound, SoundId::CubeImpact);
        assert_eq!(sounds[0].volume, 0.75);
        assert_eq!(sounds[1].target, SoundTarget::Player { player });
        assert!(sched.outbound().signals().is_empty());

        // Debug verbosity adds the kick breakdown
        clock.advance(1_000);
        tx.try_send(InboundEvent::SetHitDebug { enabled: true }).unwrap();
        tx.try_send(InboundEvent::Kick {
            player,
            cube: CubeId(1),
        })
        .unwrap();
        sched.run_tick();
        assert!(sched.outbound().signals().iter().any(|s| matches!(
            s,
            Signal::KickDebug {
                capped: false,
                cooldown_ms: 151,
                ..
            }
        )));
    }

    #[test]
    fn test_kick_requires_interactable_player() {
        let (mut sched, tx, _clock) = scheduler_with(FreeSpace);
        let player = Uuid::new_v4();
        spawn(&tx, DVec3::new(0.0, 64.25, 0.0));
        join(&tx, player, DVec3::new(10.0, 64.0, 0.0), DVec3::X);
        tx.try_send(InboundEvent::SetInteractable {
            player,
            interactable: false,
        })
        .unwrap();
        tx.try_send(InboundEvent::Kick {
            player,
            cube: CubeId(1),
        })
        .unwrap();
        tx.try_send(InboundEvent::Kick {
            player: Uuid::new_v4(),
            cube: CubeId(1),
        })
        .unwrap();
        sched.run_tick();

        assert_eq!(cube(&sched, 1).velocity, DVec3::ZERO);
        assert_eq!(kick_confirms(sched.outbound()), 0);
    }

    #[test]
    fn test_wall_bounce_in_arena() {
        let (mut sched, tx, _clock) = scheduler_with(ArenaTerrain::pitch());
        spawn(&tx, DVec3::new(28.0, 70.0, 0.0));
        sched.run_tick();
        sched.cubes.get_mut(CubeId(1)).unwrap().velocity.x = 0.6;

        let mut bounced = false;
        for _ in 0..10 {
            let previous = sched.resolver.previous_velocity(CubeId(1)).unwrap();
            sched.outbound_mut().clear();
            sched.run_tick();
            let ball = cube(&sched, 1);
            if ball.velocity.x < 0.0 {
                assert_eq!(ball.velocity.x, -previous.x * 0.8);
                assert!(!sched.outbound().sounds().is_empty());
                bounced = true;
                break;
            }
        }
        assert!(bounced);
    }

    #[test]
    fn test_spawn_clamped_into_arena() {
        let (mut sched, tx, _clock) = scheduler_with(ArenaTerrain::pitch());
        spawn(&tx, DVec3::new(0.0, 200.0, -50.0));
        sched.run_tick();

        assert!(sched.outbound().events.contains(&OutboundEvent::CubeSpawned {
            cube: CubeId(1),
            position: DVec3::new(0.0, 83.75, -19.75),
        }));
    }

    #[test]
    fn test_cube_bounces_off_arena_floor() {
        let (mut sched, tx, _clock) = scheduler_with(ArenaTerrain::pitch());
        spawn(&tx, DVec3::new(0.0, 80.0, 0.0));

        let mut fastest_fall = 0.0f64;
        let mut rebound = None;
        for _ in 0..80 {
            sched.run_tick();
            let vy = cube(&sched, 1).velocity.y;
            fastest_fall = fastest_fall.min(vy);
            if fastest_fall < -0.5 && vy > 0.1 {
                rebound = Some(vy);
                break;
            }
        }

        let rebound = rebound.expect("cube never bounced off the arena floor");
        assert!(rebound > 0.5);
        assert!(sched
            .outbound()
            .sounds()
            .iter()
            .any(|s| s.sound == SoundId::CubeImpact));
    }

    #[test]
    fn test_removed_cube_lingers_then_goes() {
        let (mut sched, tx, _clock) = scheduler_with(FreeSpace);
        spawn(&tx, DVec3::ZERO);
        sched.run_tick();

        tx.try_send(InboundEvent::RemoveCube { cube: CubeId(1) }).unwrap();
        sched.run_tick();
        assert!(!cube(&sched, 1).alive);
        assert!(sched
            .outbound()
            .events
            .contains(&OutboundEvent::CubeRemovalScheduled {
                cube: CubeId(1),
                remove_at_tick: 22,
            }));

        for _ in 3..22 {
            sched.run_tick();
        }
        assert_eq!(sched.cubes().len(), 1);

        sched.run_tick();
        assert!(sched.cubes().is_empty());
        assert!(sched.resolver.previous_velocity(CubeId(1)).is_none());
        assert!(sched
            .outbound()
            .events
            .contains(&OutboundEvent::CubeRemoved { cube: CubeId(1) }));
    }

    #[test]
    fn test_failing_cube_is_isolated() {
        let (mut sched, tx, _clock) = scheduler_with(FreeSpace);
        spawn(&tx, DVec3::ZERO);
        spawn(&tx, DVec3::ZERO);
        sched.run_tick();
        sched.cubes.get_mut(CubeId(1)).unwrap().velocity = DVec3::new(f64::NAN, 0.0, 0.0);
        sched.cubes.get_mut(CubeId(2)).unwrap().velocity = DVec3::new(1.0, 0.0, 0.0);

        sched.run_tick();

        assert!(sched.outbound().signals().iter().any(
            |s| matches!(s, Signal::ResolutionFailed { cube, .. } if *cube == CubeId(1))
        ));
        assert_eq!(
            sched.resolver.previous_velocity(CubeId(2)),
            Some(DVec3::new(1.0, 0.0, 0.0))
        );
    }

    struct PanickyTerrain;

    impl Terrain for PanickyTerrain {
        fn advance(&self, cube: &mut Cube) {
            if cube.id == CubeId(1) {
                panic!("terrain failure");
            }
            cube.position += cube.velocity;
        }
    }

    #[test]
    fn test_panicking_cube_is_isolated() {
        let (mut sched, tx, _clock) = scheduler_with(PanickyTerrain);
        spawn(&tx, DVec3::ZERO);
        spawn(&tx, DVec3::ZERO);
        sched.run_tick();
        sched.cubes.get_mut(CubeId(2)).unwrap().velocity = DVec3::new(0.5, 0.0, 0.0);

        sched.run_tick();
        assert_eq!(cube(&sched, 2).position.x, 0.5);
        assert_eq!(sched.tick(), 2);
    }

    #[test]
    fn test_charge_levels_published() {
        let (mut sched, tx, _clock) = scheduler_with(FreeSpace);
        let player = Uuid::new_v4();
        let spectator = Uuid::new_v4();
        join(&tx, player, DVec3::ZERO, DVec3::X);
        join(&tx, spectator, DVec3::ZERO, DVec3::X);
        tx.try_send(InboundEvent::SetInteractable {
            player: spectator,
            interactable: false,
        })
        .unwrap();
        tx.try_send(InboundEvent::BeginCharge { player }).unwrap();
        tx.try_send(InboundEvent::BeginCharge { player: spectator }).unwrap();
        sched.run_tick();

        assert_eq!(sched.charging_players(), 1);
        assert!(sched.outbound().events.iter().any(|e| matches!(
            e,
            OutboundEvent::ChargeLevel { player: p, level } if *p == player && (*level - 0.055).abs() < 1e-12
        )));

        sched.outbound_mut().clear();
        tx.try_send(InboundEvent::EndCharge { player }).unwrap();
        sched.run_tick();
        assert_eq!(sched.charging_players(), 0);
        assert_eq!(
            sched.outbound().events,
            vec![OutboundEvent::ChargeLevel { player, level: 0.0 }]
        );
    }

    #[test]
    fn test_leaving_purges_player_state() {
        let (mut sched, tx, _clock) = scheduler_with(FreeSpace);
        let player = Uuid::new_v4();
        spawn(&tx, DVec3::new(0.0, 64.25, 0.0));
        join(&tx, player, DVec3::new(10.0, 64.0, 0.0), DVec3::X);
        tx.try_send(InboundEvent::BeginCharge { player }).unwrap();
        tx.try_send(InboundEvent::Rise {
            player,
            cube: CubeId(1),
        })
        .unwrap();
        sched.run_tick();
        assert!(sched.touches.last(&player, TouchType::Rise).is_some());

        tx.try_send(InboundEvent::PlayerLeft { player }).unwrap();
        sched.run_tick();
        assert!(sched.roster().is_empty());
        assert_eq!(sched.charging_players(), 0);
        assert!(sched.touches.last(&player, TouchType::Rise).is_none());
    }

    #[test]
    fn test_events_apply_in_order() {
        let (mut sched, tx, _clock) = scheduler_with(FreeSpace);
        let early = Uuid::new_v4();
        let gone = Uuid::new_v4();

        tx.try_send(InboundEvent::PlayerMoved {
            player: early,
            position: DVec3::ONE,
            look: DVec3::X,
        })
        .unwrap();
        join(&tx, early, DVec3::ZERO, DVec3::X);
        join(&tx, gone, DVec3::ZERO, DVec3::X);
        tx.try_send(InboundEvent::PlayerLeft { player: gone }).unwrap();
        sched.run_tick();

        assert_eq!(sched.roster().len(), 1);
        assert_eq!(sched.roster().get(&early).unwrap().position, DVec3::ZERO);
    }

    #[test]
    fn test_rise_stamp_swept() {
        let (mut sched, tx, clock) = scheduler_with(FreeSpace);
        let player = Uuid::new_v4();
        spawn(&tx, DVec3::new(0.0, 64.25, 0.0));
        join(&tx, player, DVec3::new(10.0, 64.0, 0.0), DVec3::X);
        tx.try_send(InboundEvent::Rise {
            player,
            cube: CubeId(1),
        })
        .unwrap();
        sched.run_tick();

        let ball = cube(&sched, 1);
        assert_eq!(ball.lifted_at, Some(1_000_000));
        assert!(ball.velocity.y > 0.6);

        clock.advance(1_500);
        while sched.tick() % 20 != 0 {
            sched.run_tick();
        }
        assert_eq!(cube(&sched, 1).lifted_at, None);
    }

    #[test]
    fn test_sweep_leaves_dead_cube_untouched() {
        let (mut sched, tx, clock) = scheduler_with(FreeSpace);
        spawn(&tx, DVec3::new(0.0, 64.25, 0.0));
        sched.run_tick();
        sched.cubes.get_mut(CubeId(1)).unwrap().lifted_at = Some(1_000_000);

        tx.try_send(InboundEvent::RemoveCube { cube: CubeId(1) }).unwrap();
        sched.run_tick();

        clock.advance(1_500);
        while sched.tick() % 20 != 0 {
            sched.run_tick();
        }
        let ball = cube(&sched, 1);
        assert!(!ball.alive);
        assert_eq!(ball.lifted_at, Some(1_000_000));
    }

    #[test]
    fn test_closed_inbound_detected() {
        let (mut sched, tx, _clock) = scheduler_with(FreeSpace);
        spawn(&tx, DVec3::ZERO);
        drop(tx);
        sched.run_tick();
        assert!(sched.inbound_closed());
        assert_eq!(sched.cubes().len(), 1);
    }
}
