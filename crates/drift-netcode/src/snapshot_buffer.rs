//! Per-entity snapshot buffering and time-based sampling
//!
//! Remote entities arrive as a jittery stream of timestamped snapshots. The
//! buffer keeps the most recent few, ordered by timestamp, and reconstructs a
//! continuous position for any render time: interpolating inside the buffered
//! window and extrapolating linearly outside it.

use drift_core::{EntitySnapshot, Millis, Vector2};
use std::collections::VecDeque;
use tracing::trace;

/// Bounded, timestamp-ordered snapshot queue for one remote entity
///
/// Insertion tolerates out-of-order arrival. When full, the snapshot with the
/// lowest timestamp is evicted.
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    /// Snapshots, oldest first
    snapshots: VecDeque<EntitySnapshot>,
    /// Maximum number of snapshots kept
    capacity: usize,
}

impl SnapshotBuffer {
    /// Create an empty buffer
    ///
    /// # Panics
    ///
    /// Panics if `capacity < 2`; sampling needs a pair.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "Capacity must be at least 2");
        Self {
            snapshots: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Insert a snapshot in timestamp order, evicting the oldest when full
    pub fn push(&mut self, snapshot: EntitySnapshot) {
        let at = self
            .snapshots
            .partition_point(|s| s.timestamp <= snapshot.timestamp);
        self.snapshots.insert(at, snapshot);

        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
    }

    /// Insert a batch of snapshots
    pub fn extend(&mut self, snapshots: impl IntoIterator<Item = EntitySnapshot>) {
        for snapshot in snapshots {
            self.push(snapshot);
        }
    }

    /// Position at `render_time`
    ///
    /// Returns `None` until the buffer is full: a cold buffer is not trusted
    /// to interpolate, and the caller keeps drawing where it last drew.
    pub fn sample(&self, render_time: Millis) -> Option<Vector2> {
        if !self.is_warm() {
            trace!(
                len = self.snapshots.len(),
                capacity = self.capacity,
                "snapshot buffer not warm"
            );
            return None;
        }

        let (left, right) = self.bracket(render_time)?;
        Some(resolve_position(left, right, render_time))
    }

    /// The adjacent pair used for `render_time`
    ///
    /// First pair whose newer half lies after `render_time`, or the newest
    /// pair when every snapshot is at or before it.
    fn bracket(&self, render_time: Millis) -> Option<(&EntitySnapshot, &EntitySnapshot)> {
        let len = self.snapshots.len();
        if len < 2 {
            return None;
        }

        let i = (0..len - 1)
            .find(|&i| self.snapshots[i + 1].timestamp > render_time)
            .unwrap_or(len - 2);
        Some((&self.snapshots[i], &self.snapshots[i + 1]))
    }

    /// Check if the buffer holds `capacity` snapshots
    pub fn is_warm(&self) -> bool {
        self.snapshots.len() >= self.capacity
    }

    /// Iterate snapshots, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.snapshots.iter()
    }

    pub fn oldest(&self) -> Option<&EntitySnapshot> {
        self.snapshots.front()
    }

    pub fn newest(&self) -> Option<&EntitySnapshot> {
        self.snapshots.back()
    }

    /// Timestamps of the oldest and newest snapshot
    pub fn time_range(&self) -> Option<(Millis, Millis)> {
        Some((self.oldest()?.timestamp, self.newest()?.timestamp))
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

/// Rate of change between two snapshots, in position units per millisecond
///
/// The pair is ordered by timestamp regardless of argument order. A
/// zero-duration pair has rate zero.
pub fn rate_between(a: &EntitySnapshot, b: &EntitySnapshot) -> Vector2 {
    let (left, right) = if a.timestamp <= b.timestamp { (a, b) } else { (b, a) };
    let span = right.timestamp - left.timestamp;
    if span == 0.0 {
        trace!(timestamp = left.timestamp, "zero-duration snapshot pair");
        return Vector2::ZERO;
    }
    (right.position - left.position) / span
}

/// Position at `t` on the line through `a` and `b`
///
/// Before, at, inside, at the end of, and after the pair's time range all
/// reduce to `left.position + rate * (t - left.timestamp)`.
pub fn resolve_position(a: &EntitySnapshot, b: &EntitySnapshot, t: Millis) -> Vector2 {
    let left = if a.timestamp <= b.timestamp { a } else { b };
    let right = if std::ptr::eq(left, a) { b } else { a };

    // exact endpoints, free of rounding
    if t == right.timestamp && right.timestamp != left.timestamp {
        return right.position;
    }
    left.position + rate_between(left, right) * (t - left.timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(timestamp: Millis, x: f64, y: f64) -> EntitySnapshot {
        EntitySnapshot::new("remote", Vector2::new(x, y), timestamp)
    }

    fn linear_buffer() -> SnapshotBuffer {
        let mut buffer = SnapshotBuffer::new(10);
        for i in 0..10 {
            let t = i as f64 * 100.0;
            buffer.push(snap(t, t, 0.0));
        }
        buffer
    }

    #[test]
    fn test_cold_buffer_returns_none() {
        let mut buffer = SnapshotBuffer::new(10);
        for i in 0..9 {
            buffer.push(snap(i as f64 * 100.0, 0.0, 0.0));
        }
        assert!(!buffer.is_warm());
        assert_eq!(buffer.sample(250.0), None);

        buffer.push(snap(900.0, 0.0, 0.0));
        assert!(buffer.is_warm());
        assert!(buffer.sample(250.0).is_some());
    }

    #[test]
    fn test_interpolates_inside_window() {
        let buffer = linear_buffer();
        assert_eq!(buffer.sample(250.0), Some(Vector2::new(250.0, 0.0)));
        assert_eq!(buffer.sample(612.5), Some(Vector2::new(612.5, 0.0)));
    }

    #[test]
    fn test_boundaries_are_exact() {
        let buffer = linear_buffer();
        assert_eq!(buffer.sample(300.0), Some(Vector2::new(300.0, 0.0)));
        assert_eq!(buffer.sample(0.0), Some(Vector2::new(0.0, 0.0)));
        assert_eq!(buffer.sample(900.0), Some(Vector2::new(900.0, 0.0)));
    }

    #[test]
    fn test_extrapolates_both_ways() {
        let buffer = linear_buffer();
        assert_eq!(buffer.sample(1_100.0), Some(Vector2::new(1_100.0, 0.0)));
        assert_eq!(buffer.sample(-50.0), Some(Vector2::new(-50.0, 0.0)));
    }

    #[test]
    fn test_out_of_order_insert() {
        let mut buffer = SnapshotBuffer::new(10);
        for t in [500.0, 100.0, 900.0, 0.0, 300.0, 700.0, 200.0, 800.0, 400.0, 600.0] {
            buffer.push(snap(t, t * 2.0, 0.0));
        }
        let stamps: Vec<_> = buffer.iter().map(|s| s.timestamp).collect();
        assert_eq!(
            stamps,
            vec![0.0, 100.0, 200.0, 300.0, 400.0, 500.0, 600.0, 700.0, 800.0, 900.0]
        );
        assert_eq!(buffer.sample(450.0), Some(Vector2::new(900.0, 0.0)));
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let mut buffer = SnapshotBuffer::new(10);
        // newest first, then an even older straggler
        for i in (0..11).rev() {
            buffer.push(snap(i as f64 * 10.0, 0.0, 0.0));
        }
        buffer.push(snap(-5.0, 0.0, 0.0));

        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.time_range(), Some((10.0, 100.0)));
    }

    #[test]
    fn test_interpolated_point_is_between() {
        let a = snap(1_000.0, 10.0, -4.0);
        let b = snap(1_400.0, 30.0, 12.0);

        for t in [1_050.0, 1_200.0, 1_333.0] {
            let p = resolve_position(&a, &b, t);
            let w = (t - 1_000.0) / 400.0;
            assert!((p.x - (10.0 + 20.0 * w)).abs() < 1e-9);
            assert!((p.y - (-4.0 + 16.0 * w)).abs() < 1e-9);
            assert!(p.x > 10.0 && p.x < 30.0);
        }
    }

    #[test]
    fn test_argument_order_does_not_matter() {
        let a = snap(0.0, 0.0, 0.0);
        let b = snap(100.0, 50.0, 100.0);

        assert_eq!(rate_between(&a, &b), rate_between(&b, &a));
        assert_eq!(resolve_position(&b, &a, 40.0), resolve_position(&a, &b, 40.0));
        assert_eq!(resolve_position(&b, &a, 0.0), Vector2::new(0.0, 0.0));
        assert_eq!(resolve_position(&b, &a, 100.0), Vector2::new(50.0, 100.0));
    }

    #[test]
    fn test_zero_duration_pair() {
        let a = snap(200.0, 5.0, 5.0);
        let b = snap(200.0, 9.0, 9.0);

        assert_eq!(rate_between(&a, &b), Vector2::ZERO);
        let p = resolve_position(&a, &b, 500.0);
        assert!(p.is_finite());
        assert_eq!(p, Vector2::new(5.0, 5.0));
    }

    #[test]
    fn test_duplicate_timestamps_in_buffer() {
        let mut buffer = SnapshotBuffer::new(2);
        buffer.push(snap(100.0, 1.0, 1.0));
        buffer.push(snap(100.0, 2.0, 2.0));

        let p = buffer.sample(150.0).unwrap();
        assert!(p.is_finite());
    }

    #[test]
    #[should_panic]
    fn test_capacity_below_two_panics() {
        let _ = SnapshotBuffer::new(1);
    }
}
