//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use glam::DVec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::physics::CubeId;
use crate::sim::InboundEvent;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Enter the world at a position
    Join {
        position: DVec3,
        /// Look direction, vertical component included
        look: DVec3,
    },

    /// New position and look direction
    Move { position: DVec3, look: DVec3 },

    /// Game mode change (spectating, building...)
    SetInteractable { interactable: bool },

    /// Start holding the charge gesture
    ChargeStart,

    /// Release the charge gesture
    ChargeEnd,

    /// Kick a cube
    Kick { cube: CubeId },

    /// Lift a cube
    Rise { cube: CubeId },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

impl ClientMsg {
    /// Simulation event for this message, `None` for messages answered directly
    pub fn into_event(self, player: Uuid) -> Option<InboundEvent> {
        let event = match self {
            ClientMsg::Join { position, look } => InboundEvent::PlayerJoined {
                player,
                position,
                look,
            },
            ClientMsg::Move { position, look } => InboundEvent::PlayerMoved {
                player,
                position,
                look,
            },
            ClientMsg::SetInteractable { interactable } => InboundEvent::SetInteractable {
                player,
                interactable,
            },
            ClientMsg::ChargeStart => InboundEvent::BeginCharge { player },
            ClientMsg::ChargeEnd => InboundEvent::EndCharge { player },
            ClientMsg::Kick { cube } => InboundEvent::Kick { player, cube },
            ClientMsg::Rise { cube } => InboundEvent::Rise { player, cube },
            ClientMsg::Ping { .. } => return None,
        };
        Some(event)
    }
}

/// Messages sent from server to one client.
/// Simulation events are sent as their own tagged JSON alongside these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        player_id: Uuid,
        server_time: u64,
        tick: u64,
    },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
        server_time: u64,
    },
}
