//! Entities drawn by the client
//!
//! Every entity shares one state type (`EntitySnapshot`). What moves it is
//! selected by `Control`: the locally controlled entity is predicted from its
//! intents each frame, remote entities are sampled from their snapshot
//! buffer.

use crate::SnapshotBuffer;
use drift_core::{Color, Direction, EntitySnapshot, Millis, PeerId, Vector2};
use tracing::debug;

/// How an avatar's position is produced
#[derive(Debug, Clone)]
pub enum Control {
    /// Integrated locally from movement intents
    Predicted,
    /// Reconstructed from buffered peer snapshots
    Interpolated(SnapshotBuffer),
}

/// Timing for one render frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    /// Corrected time of this frame
    pub now: Millis,
    /// Corrected time since the previous frame
    pub elapsed: Millis,
    /// Time remote buffers are sampled at (`now - render_delay`)
    pub render_time: Millis,
}

/// A drawable entity
#[derive(Debug, Clone)]
pub struct Avatar {
    body: EntitySnapshot,
    control: Control,
}

impl Avatar {
    /// The locally controlled entity
    pub fn local(body: EntitySnapshot) -> Self {
        Self {
            body,
            control: Control::Predicted,
        }
    }

    /// A remote entity seeded from the first snapshot seen for its id
    ///
    /// The buffer starts empty; push `first` (and the rest of its batch)
    /// afterwards.
    pub fn remote(first: &EntitySnapshot, capacity: usize) -> Self {
        Self {
            body: first.clone(),
            control: Control::Interpolated(SnapshotBuffer::new(capacity)),
        }
    }

    /// Advance one frame according to the control mode
    pub fn update(&mut self, frame: &FrameTiming) {
        match self.control {
            Control::Predicted => {
                self.advance(frame.elapsed);
                self.body.timestamp = frame.now;
            }
            Control::Interpolated(_) => {
                self.sample(frame.render_time);
            }
        }
    }

    /// Integrate held intents over `elapsed` milliseconds
    ///
    /// Each axis applies both of its adjustments, so opposing intents cancel.
    /// No clamping or collision. Remote avatars ignore this.
    pub fn advance(&mut self, elapsed: Millis) {
        if !matches!(self.control, Control::Predicted) {
            return;
        }
        let intents = self.body.intents;
        let step = self.body.velocity * elapsed;
        let position = &mut self.body.position;

        if intents.up {
            position.y -= step.y;
        }
        if intents.down {
            position.y += step.y;
        }
        if intents.left {
            position.x -= step.x;
        }
        if intents.right {
            position.x += step.x;
        }
    }

    /// Move to the buffered position at `render_time`
    ///
    /// Returns false, leaving the position frozen, while the buffer is cold
    /// or for a predicted avatar.
    pub fn sample(&mut self, render_time: Millis) -> bool {
        let Control::Interpolated(buffer) = &self.control else {
            return false;
        };
        match buffer.sample(render_time) {
            Some(position) => {
                self.body.position = position;
                true
            }
            None => false,
        }
    }

    /// Buffer incoming snapshots
    pub fn push_snapshots(&mut self, snapshots: impl IntoIterator<Item = EntitySnapshot>) {
        match &mut self.control {
            Control::Interpolated(buffer) => buffer.extend(snapshots),
            Control::Predicted => {
                debug!(id = %self.body.id, "dropping snapshots addressed to a predicted avatar");
            }
        }
    }

    /// Hold or release a movement intent
    pub fn set_intent(&mut self, direction: Direction, active: bool) {
        self.body.intents.set(direction, active);
    }

    /// Current state stamped with `timestamp`, for broadcast
    pub fn snapshot(&self, timestamp: Millis) -> EntitySnapshot {
        EntitySnapshot {
            timestamp,
            ..self.body.clone()
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.body.id
    }

    /// Rename, e.g. once the transport assigns the local id
    pub fn set_id(&mut self, id: PeerId) {
        self.body.id = id;
    }

    pub fn position(&self) -> Vector2 {
        self.body.position
    }

    pub fn radius(&self) -> f64 {
        self.body.radius
    }

    pub fn color(&self) -> &Color {
        &self.body.color
    }

    pub fn body(&self) -> &EntitySnapshot {
        &self.body
    }

    pub fn control(&self) -> &Control {
        &self.control
    }

    pub fn is_local(&self) -> bool {
        matches!(self.control, Control::Predicted)
    }

    /// The snapshot buffer of a remote avatar
    pub fn buffer(&self) -> Option<&SnapshotBuffer> {
        match &self.control {
            Control::Interpolated(buffer) => Some(buffer),
            Control::Predicted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_at(x: f64, y: f64) -> Avatar {
        Avatar::local(
            EntitySnapshot::new("me", Vector2::new(x, y), 0.0)
                .with_velocity(Vector2::new(0.2, 0.2))
                .with_radius(20.0),
        )
    }

    #[test]
    fn test_advance_right() {
        let mut me = local_at(400.0, 300.0);
        me.set_intent(Direction::Right, true);
        me.advance(1_000.0);

        assert_eq!(me.position(), Vector2::new(600.0, 300.0));
    }

    #[test]
    fn test_advance_diagonal() {
        let mut me = local_at(0.0, 0.0);
        me.set_intent(Direction::Up, true);
        me.set_intent(Direction::Left, true);
        me.advance(50.0);

        assert_eq!(me.position(), Vector2::new(-10.0, -10.0));
    }

    #[test]
    fn test_opposing_intents_cancel() {
        let mut me = local_at(100.0, 100.0);
        me.set_intent(Direction::Left, true);
        me.set_intent(Direction::Right, true);
        me.advance(250.0);

        assert_eq!(me.position(), Vector2::new(100.0, 100.0));
    }

    #[test]
    fn test_no_intents_no_motion() {
        let mut me = local_at(5.0, 5.0);
        me.advance(10_000.0);
        assert_eq!(me.position(), Vector2::new(5.0, 5.0));
    }

    #[test]
    fn test_local_update_stamps_time() {
        let mut me = local_at(0.0, 0.0);
        me.set_intent(Direction::Down, true);
        me.update(&FrameTiming {
            now: 5_000.0,
            elapsed: 10.0,
            render_time: 4_800.0,
        });

        assert_eq!(me.position(), Vector2::new(0.0, 2.0));
        assert_eq!(me.body().timestamp, 5_000.0);
        assert_eq!(me.snapshot(6_000.0).timestamp, 6_000.0);
        assert!(me.snapshot(6_000.0).intents.down);
    }

    #[test]
    fn test_remote_frozen_until_warm() {
        let first = EntitySnapshot::new("peer", Vector2::new(7.0, 7.0), 0.0).with_radius(12.0);
        let mut remote = Avatar::remote(&first, 3);
        remote.push_snapshots([first.clone()]);

        assert!(!remote.sample(50.0));
        assert_eq!(remote.position(), Vector2::new(7.0, 7.0));
        assert_eq!(remote.radius(), 12.0);

        remote.push_snapshots([
            EntitySnapshot::new("peer", Vector2::new(17.0, 7.0), 100.0),
            EntitySnapshot::new("peer", Vector2::new(27.0, 7.0), 200.0),
        ]);
        assert!(remote.sample(150.0));
        assert_eq!(remote.position(), Vector2::new(22.0, 7.0));
    }

    #[test]
    fn test_remote_ignores_advance() {
        let first = EntitySnapshot::new("peer", Vector2::new(1.0, 1.0), 0.0)
            .with_velocity(Vector2::new(1.0, 1.0));
        let mut remote = Avatar::remote(&first, 2);
        remote.set_intent(Direction::Right, true);
        remote.advance(100.0);

        assert_eq!(remote.position(), Vector2::new(1.0, 1.0));
        assert!(!remote.is_local());
        assert!(remote.buffer().is_some());
    }

    #[test]
    fn test_local_ignores_snapshots() {
        let mut me = local_at(0.0, 0.0);
        me.push_snapshots([EntitySnapshot::new("me", Vector2::new(9.0, 9.0), 1.0)]);
        assert!(!me.sample(1.0));
        assert!(me.buffer().is_none());
        assert_eq!(me.position(), Vector2::ZERO);
    }
}
