//! Drift Netcode - Client-side synchronization for real-time multiplayer
//!
//! This crate turns a jittery, periodically sampled stream of peer states
//! into continuous motion on screen:
//!
//! - **Clock calibration**: one-shot offset estimate from a batch of pings
//! - **Snapshot buffering**: bounded, time-ordered queue per remote entity
//! - **Interpolation**: linear sampling behind "now", extrapolating past the
//!   buffered window
//! - **Local prediction**: the controlled entity moves straight from input
//! - **Session**: registry, render tick, and periodic broadcast
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Session                             │
//! │  ┌──────────────┐   offset    ┌───────────────────────────┐  │
//! │  │    Clock     │────────────▶│  corrected_now()          │  │
//! │  │ Synchronizer │             └───────────┬───────────────┘  │
//! │  └──────▲───────┘                         │                  │
//! │         │ Pong           render_time      ▼                  │
//! │  ┌──────┴───────┐  BulkState  ┌──────────────────────────┐   │
//! │  │   Network    │────────────▶│ Remote avatars (buffers) │─┐ │
//! │  └──────▲───────┘             └──────────────────────────┘ │ │
//! │         │ LocalUpdate         ┌──────────────────────────┐ │ │
//! │         └─────────────────────│ Local avatar (predicted) │─┤ │
//! │                               └──────────────────────────┘ ▼ │
//! │                                                  Surface     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use drift_core::{SystemClock, Vector2, DriftRng};
//! use drift_netcode::{default_local_body, NetcodeConfig, Session};
//!
//! let body = default_local_body("me", Vector2::new(400.0, 300.0), &mut DriftRng::from_entropy());
//! let mut session = Session::new(NetcodeConfig::default(), SystemClock, body)?;
//!
//! for ping in session.begin_calibration() {
//!     send_message(&mut connection, &ping)?;
//! }
//!
//! loop {
//!     let inbound = drain_messages(&mut connection)?;
//!     if session.is_synchronized() {
//!         session.frame(inbound, &mut surface)?;
//!         if let Some(update) = session.poll_broadcast() {
//!             send_message(&mut connection, &update)?;
//!         }
//!     } else {
//!         inbound.into_iter().for_each(|m| { session.deliver(m); });
//!         session.check_calibration_deadline()?;
//!     }
//! }
//! ```

mod avatar;
mod clock_sync;
mod config;
mod error;
mod session;
mod snapshot_buffer;
mod surface;
mod transport;

pub use avatar::{Avatar, Control, FrameTiming};
pub use clock_sync::{
    ClockOffsetEstimate, ClockSynchronizer, CorrectedClock, PingReply, PingRequest, PingSample,
};
pub use config::NetcodeConfig;
pub use error::{Error, Result};
pub use session::{default_local_body, FrameReport, Phase, Session, DEFAULT_RADIUS, DEFAULT_SPEED};
pub use snapshot_buffer::{rate_between, resolve_position, SnapshotBuffer};
pub use surface::{DrawnCircle, RecordingSurface, Surface};
pub use transport::{
    decode, drain_messages, encode, send_message, BulkState, ClientMessage, Connection,
    ServerMessage,
};
