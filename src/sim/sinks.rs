//! Outbound side effects produced by the simulation

use glam::DVec3;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::physics::{CubeId, KickResult, PlayerId};

/// Where a sound plays
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SoundTarget {
    /// Audible around a point
    Location { position: DVec3 },
    /// Only for one player
    Player { player: PlayerId },
}

/// Sounds the simulation asks the host to play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundId {
    CubeImpact,
    KickConfirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SoundEvent {
    pub target: SoundTarget,
    pub sound: SoundId,
    pub volume: f32,
    pub pitch: f32,
}

/// Observability signals
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    /// A cube was slowed down to the speed cap
    SpeedCapped { cube: CubeId, speed: f64, max: f64 },
    /// A tick took longer than its budget
    TickOverBudget {
        tick: u64,
        elapsed_micros: u64,
        budget_micros: u64,
    },
    /// Resolution of one cube failed and was skipped
    ResolutionFailed { cube: CubeId, reason: String },
    /// Breakdown of an accepted kick
    KickDebug {
        player: PlayerId,
        cube: CubeId,
        result: KickResult,
        /// The soft cap changed the kick
        capped: bool,
        /// Milliseconds until this player can kick the same way again
        cooldown_ms: u64,
    },
}

/// Receives sounds in the order they were queued
pub trait SoundSink {
    fn play(&mut self, sound: SoundEvent);
}

/// Receives cube lifecycle notifications
pub trait LifecycleSink {
    fn spawned(&mut self, cube: CubeId, position: DVec3);

    fn removal_scheduled(&mut self, cube: CubeId, remove_at_tick: u64);

    fn removed(&mut self, cube: CubeId);
}

/// Receives observability signals
pub trait ObservabilitySink {
    fn signal(&mut self, signal: Signal);
}

/// Receives charge levels for each charging player
pub trait IndicatorSink {
    fn charge_level(&mut self, player: PlayerId, level: f64);
}

/// Every outbound seam at once
pub trait Outbound: SoundSink + LifecycleSink + ObservabilitySink + IndicatorSink + Send {}

impl<T> Outbound for T where T: SoundSink + LifecycleSink + ObservabilitySink + IndicatorSink + Send {}

/// Outbound side effect as sent to subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    Sound(SoundEvent),
    CubeSpawned { cube: CubeId, position: DVec3 },
    CubeRemovalScheduled { cube: CubeId, remove_at_tick: u64 },
    CubeRemoved { cube: CubeId },
    ChargeLevel { player: PlayerId, level: f64 },
    Signal(Signal),
}

impl<T> SoundSink for T
where
    T: PushEvent,
{
    fn play(&mut self, sound: SoundEvent) {
        self.push(OutboundEvent::Sound(sound));
    }
}

impl<T> LifecycleSink for T
where
    T: PushEvent,
{
    fn spawned(&mut self, cube: CubeId, position: DVec3) {
        self.push(OutboundEvent::CubeSpawned { cube, position });
    }

    fn removal_scheduled(&mut self, cube: CubeId, remove_at_tick: u64) {
        self.push(OutboundEvent::CubeRemovalScheduled {
            cube,
            remove_at_tick,
        });
    }

    fn removed(&mut self, cube: CubeId) {
        self.push(OutboundEvent::CubeRemoved { cube });
    }
}

impl<T> ObservabilitySink for T
where
    T: PushEvent,
{
    fn signal(&mut self, signal: Signal) {
        self.push(OutboundEvent::Signal(signal));
    }
}

impl<T> IndicatorSink for T
where
    T: PushEvent,
{
    fn charge_level(&mut self, player: PlayerId, level: f64) {
        self.push(OutboundEvent::ChargeLevel { player, level });
    }
}

/// Sinks that forward everything as [`OutboundEvent`]s
pub trait PushEvent {
    fn push(&mut self, event: OutboundEvent);
}

/// Fans events out to every WebSocket subscriber
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<OutboundEvent>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<OutboundEvent>) -> Self {
        Self { tx }
    }
}

impl PushEvent for BroadcastSink {
    fn push(&mut self, event: OutboundEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}

/// Keeps every event in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub events: Vec<OutboundEvent>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sounds(&self) -> Vec<SoundEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                OutboundEvent::Sound(sound) => Some(*sound),
                _ => None,
            })
            .collect()
    }

    pub fn signals(&self) -> Vec<&Signal> {
        self.events
            .iter()
            .filter_map(|e| match e {
                OutboundEvent::Signal(signal) => Some(signal),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl PushEvent for MemorySink {
    fn push(&mut self, event: OutboundEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_events_serialize_tagged() {
        let sound = OutboundEvent::Sound(SoundEvent {
            target: SoundTarget::Location {
                position: DVec3::new(1.0, 2.0, 3.0),
            },
            sound: SoundId::CubeImpact,
            volume: 0.5,
            pitch: 1.0,
        });
        let json = serde_json::to_value(&sound).unwrap();
        assert_eq!(json["type"], "sound");
        assert_eq!(json["sound"], "cube_impact");
        assert_eq!(json["target"]["kind"], "location");
        assert_eq!(json["target"]["position"], serde_json::json!([1.0, 2.0, 3.0]));

        let signal = OutboundEvent::Signal(Signal::SpeedCapped {
            cube: CubeId(4),
            speed: 6.0,
            max: 5.0,
        });
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["type"], "signal");
        assert_eq!(json["signal"], "speed_capped");
        assert_eq!(json["cube"], 4);
    }

    #[test]
    fn test_broadcast_sink_delivers() {
        let (tx, mut rx) = broadcast::channel(8);
        let mut sink = BroadcastSink::new(tx);
        let player = Uuid::new_v4();

        sink.charge_level(player, 0.25);
        sink.removed(CubeId(2));

        assert_eq!(
            rx.try_recv().unwrap(),
            OutboundEvent::ChargeLevel { player, level: 0.25 }
        );
        assert_eq!(rx.try_recv().unwrap(), OutboundEvent::CubeRemoved { cube: CubeId(2) });
    }

    #[test]
    fn test_broadcast_without_subscribers() {
        let (tx, rx) = broadcast::channel(8);
        drop(rx);
        let mut sink = BroadcastSink::new(tx);
        sink.spawned(CubeId(1), DVec3::ZERO);
    }
}
