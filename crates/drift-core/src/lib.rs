//! Drift Core - Shared value types for client-side network synchronization
//!
//! This crate provides the plain data that every other drift crate speaks:
//! - Planar math (`Vector2`)
//! - Peer identity (`PeerId`)
//! - Entity snapshots, the live and wire representation of a moving body
//!   (`EntitySnapshot`, `MovementIntents`, `Color`)
//! - Millisecond time and pluggable wall clocks (`WallClock`, `SystemClock`,
//!   `ManualClock`)
//! - A deterministic RNG for display colors and simulated jitter (`DriftRng`)
//!
//! Nothing here knows about the network; see `drift-netcode` for the
//! synchronization engine built on top of these types.

mod error;
mod identity;
mod rng;
mod snapshot;
pub mod time;
mod vector;

pub use error::{Error, Result};
pub use identity::PeerId;
pub use rng::DriftRng;
pub use snapshot::{Color, Direction, EntitySnapshot, MovementIntents};
pub use time::{Cadence, ManualClock, Millis, SystemClock, WallClock};
pub use vector::Vector2;
