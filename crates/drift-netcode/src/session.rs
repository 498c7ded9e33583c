//! Session orchestration
//!
//! A `Session` owns the local avatar and the registry of remote avatars, and
//! moves through two phases:
//!
//! 1. `Connecting` - ping replies are collected; nothing is rendered or sent.
//! 2. `Synchronized` - the clock offset is fixed; frames render and the local
//!    state is broadcast on a fixed cadence.
//!
//! The transition happens once, when the last ping of the batch arrives, and
//! is never undone.
//!
//! The session is single-writer: everything goes through `&mut self`, so the
//! driver decides the order. `frame` applies the conventional order of
//! inbound messages, local prediction, remote sampling, then drawing.

use crate::avatar::{Avatar, FrameTiming};
use crate::clock_sync::{ClockOffsetEstimate, ClockSynchronizer, CorrectedClock, PingRequest};
use crate::surface::Surface;
use crate::transport::{BulkState, ClientMessage, Connection, ServerMessage};
use crate::{Error, NetcodeConfig, Result};
use drift_core::{
    Cadence, Color, Direction, DriftRng, EntitySnapshot, Millis, PeerId, Vector2, WallClock,
};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

/// Per-axis speed of a freshly spawned local entity, pixels per millisecond
pub const DEFAULT_SPEED: f64 = 0.2;

/// Radius of a freshly spawned local entity, pixels
pub const DEFAULT_RADIUS: f64 = 20.0;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Synchronized,
}

/// What happened in one rendered frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Corrected time of the frame
    pub now: Millis,
    /// Corrected time since the previous frame
    pub elapsed_millis: Millis,
    /// Time remote buffers were sampled at
    pub render_time: Millis,
    /// Remote avatars drawn
    pub drawn_remotes: usize,
}

enum Link<C> {
    Connecting {
        sync: ClockSynchronizer,
        started_at: Option<Millis>,
    },
    Synchronized {
        clock: CorrectedClock<C>,
        last_frame: Millis,
        broadcast: Cadence,
    },
}

/// Client-side synchronization session
pub struct Session<C: WallClock + Clone> {
    config: NetcodeConfig,
    clock: C,
    link: Link<C>,
    local: Avatar,
    remotes: IndexMap<PeerId, Avatar>,
}

/// A local entity at `center`, with the default speed, radius and a random
/// color
pub fn default_local_body(id: impl Into<PeerId>, center: Vector2, rng: &mut DriftRng) -> EntitySnapshot {
    EntitySnapshot::new(id, center, 0.0)
        .with_velocity(Vector2::new(DEFAULT_SPEED, DEFAULT_SPEED))
        .with_radius(DEFAULT_RADIUS)
        .with_color(Color::random(rng))
}

impl<C: WallClock + Clone> Session<C> {
    /// Create a session in the `Connecting` phase
    pub fn new(config: NetcodeConfig, clock: C, local: EntitySnapshot) -> Result<Self> {
        config.validate()?;
        let sync = ClockSynchronizer::new(config.ping_samples, config.trim_ratio);
        Ok(Self {
            config,
            clock,
            link: Link::Connecting {
                sync,
                started_at: None,
            },
            local: Avatar::local(local),
            remotes: IndexMap::new(),
        })
    }

    /// The full batch of ping requests, stamped now
    ///
    /// Starts the calibration deadline. Returns nothing once synchronized.
    pub fn begin_calibration(&mut self) -> Vec<ClientMessage> {
        let now = self.clock.now_millis();
        match &mut self.link {
            Link::Connecting { sync, started_at } => {
                started_at.get_or_insert(now);
                info!(samples = sync.expected(), "starting clock calibration");
                (0..sync.expected())
                    .map(|_| {
                        ClientMessage::Ping(PingRequest {
                            client_send: self.clock.now_millis(),
                        })
                    })
                    .collect()
            }
            Link::Synchronized { .. } => Vec::new(),
        }
    }

    /// Apply one inbound message
    ///
    /// Returns the clock estimate on the message that completes calibration.
    pub fn deliver(&mut self, message: ServerMessage) -> Option<ClockOffsetEstimate> {
        match message {
            ServerMessage::Pong(reply) => {
                let sample = reply.received_at(self.clock.now_millis());
                self.record_ping(sample)
            }
            ServerMessage::BulkState(state) => {
                self.apply_bulk_state(state);
                None
            }
            ServerMessage::RemovePeer(id) => {
                self.remove_peer(&id);
                None
            }
        }
    }

    fn record_ping(&mut self, sample: crate::PingSample) -> Option<ClockOffsetEstimate> {
        let Link::Connecting { sync, .. } = &mut self.link else {
            debug!("ignoring ping reply, already synchronized");
            return None;
        };
        let estimate = sync.record_sample(sample)?;

        let clock = CorrectedClock::new(self.clock.clone(), estimate);
        let now = clock.corrected_now();
        self.link = Link::Synchronized {
            clock,
            last_frame: now,
            broadcast: Cadence::starting_at(self.config.broadcast_interval_ms, now),
        };
        info!(
            offset_ms = estimate.offset_millis,
            latency_ms = estimate.average_latency_millis,
            "session synchronized"
        );
        Some(estimate)
    }

    /// Buffer snapshots, creating avatars for peers seen for the first time
    ///
    /// Entries for the local id are skipped.
    pub fn apply_bulk_state(&mut self, state: BulkState) {
        let capacity = self.config.buffer_capacity;
        for (id, snapshots) in state {
            if &id == self.local.id() {
                continue;
            }
            let Some(first) = snapshots.first() else {
                continue;
            };
            let avatar = self.remotes.entry(id).or_insert_with_key(|id| {
                info!(peer = %id, "peer joined");
                Avatar::remote(first, capacity)
            });
            avatar.push_snapshots(snapshots);
        }
    }

    /// Forget a peer
    ///
    /// Unknown ids are a no-op. Returns whether a peer was removed.
    pub fn remove_peer(&mut self, id: &PeerId) -> bool {
        match self.remotes.shift_remove(id) {
            Some(_) => {
                info!(peer = %id, "peer left");
                true
            }
            None => {
                debug!(peer = %id, "removal for unknown peer");
                false
            }
        }
    }

    /// Fail if calibration has outlived its deadline
    pub fn check_calibration_deadline(&self) -> Result<()> {
        let Link::Connecting {
            sync,
            started_at: Some(started_at),
        } = &self.link
        else {
            return Ok(());
        };

        let waited = self.clock.now_millis() - started_at;
        if waited > self.config.calibration_timeout_ms {
            warn!(
                received = sync.received(),
                expected = sync.expected(),
                waited_ms = waited,
                "clock calibration timed out"
            );
            return Err(Error::CalibrationTimeout {
                received: sync.received(),
                expected: sync.expected(),
                waited_ms: waited,
            });
        }
        Ok(())
    }

    /// Render one frame
    ///
    /// Clears the surface, predicts and draws the local avatar, then samples
    /// and draws every remote avatar at `now - render_delay`.
    pub fn tick<S: Surface>(&mut self, surface: &mut S) -> Result<FrameReport> {
        let Link::Synchronized {
            clock, last_frame, ..
        } = &mut self.link
        else {
            return Err(Error::NotSynchronized);
        };

        let now = clock.corrected_now();
        let frame = FrameTiming {
            now,
            elapsed: now - *last_frame,
            render_time: now - self.config.render_delay_ms,
        };
        *last_frame = now;

        surface.clear_background().map_err(surface_error)?;

        self.local.update(&frame);
        draw(surface, &self.local)?;

        for remote in self.remotes.values_mut() {
            remote.update(&frame);
            draw(surface, remote)?;
        }

        Ok(FrameReport {
            now,
            elapsed_millis: frame.elapsed,
            render_time: frame.render_time,
            drawn_remotes: self.remotes.len(),
        })
    }

    /// Apply `inbound` in order, then render
    pub fn frame<S, I>(&mut self, inbound: I, surface: &mut S) -> Result<FrameReport>
    where
        S: Surface,
        I: IntoIterator<Item = ServerMessage>,
    {
        for message in inbound {
            self.deliver(message);
        }
        self.tick(surface)
    }

    /// The local update, when a broadcast period has elapsed
    pub fn poll_broadcast(&mut self) -> Option<ClientMessage> {
        let Link::Synchronized {
            clock, broadcast, ..
        } = &mut self.link
        else {
            return None;
        };

        let now = clock.corrected_now();
        if !broadcast.poll(now) {
            return None;
        }
        Some(ClientMessage::LocalUpdate(self.local.snapshot(now)))
    }

    /// The local update right now, for drivers with their own broadcast timer
    pub fn local_update(&self) -> Result<ClientMessage> {
        let now = self.corrected_now()?;
        Ok(ClientMessage::LocalUpdate(self.local.snapshot(now)))
    }

    /// Hold or release a movement intent on the local avatar
    pub fn set_intent(&mut self, direction: Direction, active: bool) {
        self.local.set_intent(direction, active);
    }

    /// Adopt the id the transport assigned to this client
    pub fn set_local_id(&mut self, id: PeerId) {
        self.local.set_id(id);
    }

    /// Close the connection and end the session
    pub fn shutdown<T: Connection>(self, connection: &mut T) -> Result<()> {
        info!(peers = self.remotes.len(), "session closed");
        connection
            .close()
            .map_err(|e| Error::Transport(e.to_string()))
    }

    pub fn phase(&self) -> Phase {
        match self.link {
            Link::Connecting { .. } => Phase::Connecting,
            Link::Synchronized { .. } => Phase::Synchronized,
        }
    }

    pub fn is_synchronized(&self) -> bool {
        self.phase() == Phase::Synchronized
    }

    /// Clock estimate, once synchronized
    pub fn estimate(&self) -> Option<ClockOffsetEstimate> {
        match &self.link {
            Link::Synchronized { clock, .. } => Some(clock.estimate()),
            Link::Connecting { .. } => None,
        }
    }

    /// Server-clock time, once synchronized
    pub fn corrected_now(&self) -> Result<Millis> {
        match &self.link {
            Link::Synchronized { clock, .. } => Ok(clock.corrected_now()),
            Link::Connecting { .. } => Err(Error::NotSynchronized),
        }
    }

    /// Ping replies received so far, and the batch size
    pub fn calibration_progress(&self) -> (usize, usize) {
        match &self.link {
            Link::Connecting { sync, .. } => (sync.received(), sync.expected()),
            Link::Synchronized { .. } => (self.config.ping_samples, self.config.ping_samples),
        }
    }

    pub fn local(&self) -> &Avatar {
        &self.local
    }

    pub fn remote(&self, id: &PeerId) -> Option<&Avatar> {
        self.remotes.get(id)
    }

    /// Remote avatars in arrival order
    pub fn remotes(&self) -> impl Iterator<Item = &Avatar> {
        self.remotes.values()
    }

    pub fn remote_ids(&self) -> impl Iterator<Item = &PeerId> {
        self.remotes.keys()
    }

    pub fn config(&self) -> &NetcodeConfig {
        &self.config
    }
}

fn draw<S: Surface>(surface: &mut S, avatar: &Avatar) -> Result<()> {
    surface
        .draw_circle(avatar.position(), avatar.radius(), avatar.color())
        .map_err(surface_error)
}

fn surface_error<E: std::error::Error>(err: E) -> Error {
    Error::Surface(err.to_string())
}
