//! Cube Physics Server - Authoritative cube and ball simulation
//!
//! A fixed-rate tick loop owns every cube. Clients drive it over a
//! WebSocket and a small HTTP surface; everything the simulation decides
//! is fanned back out as tagged JSON events.

pub mod app;
pub mod config;
pub mod http;
pub mod physics;
pub mod sim;
pub mod util;
pub mod world;
pub mod ws;
