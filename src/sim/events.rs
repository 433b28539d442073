//! Inbound events and the queue that carries them to the tick loop

use glam::DVec3;
use tokio::sync::mpsc;

use crate::physics::{CubeId, PlayerId};

/// Everything that can happen to the world between two ticks
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    SpawnCube {
        position: DVec3,
        requested_by: Option<PlayerId>,
    },
    RemoveCube {
        cube: CubeId,
    },
    PlayerJoined {
        player: PlayerId,
        position: DVec3,
        look: DVec3,
    },
    PlayerMoved {
        player: PlayerId,
        position: DVec3,
        look: DVec3,
    },
    PlayerLeft {
        player: PlayerId,
    },
    SetInteractable {
        player: PlayerId,
        interactable: bool,
    },
    BeginCharge {
        player: PlayerId,
    },
    EndCharge {
        player: PlayerId,
    },
    Kick {
        player: PlayerId,
        cube: CubeId,
    },
    Rise {
        player: PlayerId,
        cube: CubeId,
    },
    SetHitDebug {
        enabled: bool,
    },
}

/// Queue errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("Simulation event queue is full")]
    QueueFull,

    #[error("Simulation is not running")]
    Closed,
}

/// Cloneable producer side of the inbound queue
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<InboundEvent>,
}

/// Create the bounded inbound queue
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<InboundEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender { tx }, rx)
}

impl EventSender {
    /// Enqueue without waiting
    pub fn try_send(&self, event: InboundEvent) -> Result<(), SimError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SimError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SimError::Closed,
        })
    }

    /// Enqueue, waiting for room
    pub async fn send(&self, event: InboundEvent) -> Result<(), SimError> {
        self.tx.send(event).await.map_err(|_| SimError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_and_closed() {
        let (tx, rx) = channel(1);
        let event = InboundEvent::SetHitDebug { enabled: true };

        assert_eq!(tx.try_send(event.clone()), Ok(()));
        assert_eq!(tx.try_send(event.clone()), Err(SimError::QueueFull));

        drop(rx);
        assert!(tx.is_closed());
        assert_eq!(tx.try_send(event), Err(SimError::Closed));
    }
}
