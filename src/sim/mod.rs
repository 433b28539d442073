//! Fixed-timestep simulation around the physics core

pub mod driver;
pub mod events;
pub mod scheduler;
pub mod sinks;
pub mod stats;

pub use driver::{SimStatus, Simulation, SimulationHandle};
pub use events::{EventSender, InboundEvent, SimError};
pub use scheduler::TickScheduler;
pub use sinks::{BroadcastSink, MemorySink, OutboundEvent, Signal, SoundEvent};
pub use stats::{StatsSummary, TickStats};
