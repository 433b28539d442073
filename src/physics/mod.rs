//! Cube physics core

pub mod charge;
pub mod collision;
pub mod cube;
pub mod formulae;
pub mod kick;
pub mod snapshot;
pub mod touch;

pub use charge::ChargeAccumulator;
pub use collision::{CollisionResolver, ResolveError, ResolveOutcome};
pub use cube::{Cube, CubeId, CubeRegistry};
pub use kick::{KickPowerCalculator, KickResult, SoftCapPolicy};
pub use snapshot::{PlayerSnapshot, PlayerSnapshotCache};
pub use touch::{TouchDebounce, TouchType};

/// Players are identified by the id their connection announced
pub type PlayerId = uuid::Uuid;
