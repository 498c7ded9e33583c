//! One-shot clock calibration
//!
//! Estimates the offset between the local wall clock and the server clock
//! from a fixed batch of ping round trips. The estimate is computed exactly
//! once, when the last sample of the batch arrives, and never revised.

use drift_core::{Millis, WallClock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Outbound ping, stamped with the local clock when created
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingRequest {
    pub client_send: Millis,
}

/// Server echo of a ping
///
/// `client_receive` travels as zero and is filled in by the requester on
/// arrival.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingReply {
    pub client_send: Millis,
    pub server_time: Millis,
    pub client_receive: Millis,
}

impl PingReply {
    /// The server's answer to `request`, stamped with its own clock
    pub fn answer(request: PingRequest, server_time: Millis) -> Self {
        Self {
            client_send: request.client_send,
            server_time,
            client_receive: 0.0,
        }
    }

    /// Complete the round trip with the local arrival time
    pub fn received_at(self, client_receive: Millis) -> PingSample {
        PingSample {
            client_send: self.client_send,
            server_time: self.server_time,
            client_receive,
        }
    }
}

/// A complete round trip
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingSample {
    pub client_send: Millis,
    pub server_time: Millis,
    pub client_receive: Millis,
}

impl PingSample {
    /// Time between sending the ping and receiving the echo
    pub fn latency(&self) -> Millis {
        self.client_receive - self.client_send
    }

    /// Server clock minus the local clock at the moment the server stamped
    /// the reply, assuming a symmetric path
    pub fn raw_offset(&self) -> Millis {
        let estimated_local = self.client_send + self.latency() / 2.0;
        self.server_time - estimated_local
    }
}

/// The calibration result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockOffsetEstimate {
    /// Add to the local clock to approximate the server clock
    pub offset_millis: Millis,
    /// Mean round trip over the whole batch, untrimmed
    pub average_latency_millis: Millis,
}

/// Collects ping samples and produces a `ClockOffsetEstimate` once
#[derive(Debug, Clone)]
pub struct ClockSynchronizer {
    samples: Vec<PingSample>,
    expected: usize,
    trim_ratio: f64,
    estimate: Option<ClockOffsetEstimate>,
}

impl ClockSynchronizer {
    /// Create a synchronizer waiting for `expected` samples
    ///
    /// `trim_ratio` is the share of sorted offsets dropped from each end
    /// (0.3 keeps the middle 40%).
    pub fn new(expected: usize, trim_ratio: f64) -> Self {
        Self {
            samples: Vec::with_capacity(expected),
            expected,
            trim_ratio,
            estimate: None,
        }
    }

    /// Record one round trip
    ///
    /// Returns the estimate on the call that completes the batch and `None`
    /// otherwise. Samples arriving after that are ignored.
    pub fn record_sample(&mut self, sample: PingSample) -> Option<ClockOffsetEstimate> {
        if self.estimate.is_some() {
            debug!(
                client_send = sample.client_send,
                "ignoring ping reply after calibration"
            );
            return None;
        }

        self.samples.push(sample);
        if self.samples.len() < self.expected {
            return None;
        }

        let estimate = self.finalize();
        info!(
            offset_ms = estimate.offset_millis,
            latency_ms = estimate.average_latency_millis,
            samples = self.expected,
            "clock calibrated"
        );
        self.estimate = Some(estimate);
        self.estimate
    }

    fn finalize(&self) -> ClockOffsetEstimate {
        let n = self.samples.len();

        let mut offsets: Vec<Millis> = self.samples.iter().map(PingSample::raw_offset).collect();
        offsets.sort_by(f64::total_cmp);

        let trim = (n as f64 * self.trim_ratio).floor() as usize;
        let kept = &offsets[trim..n - trim];
        let offset_millis = kept.iter().sum::<Millis>() / kept.len() as f64;

        let total_latency: Millis = self.samples.iter().map(PingSample::latency).sum();
        let average_latency_millis = total_latency / n as f64;

        ClockOffsetEstimate {
            offset_millis,
            average_latency_millis,
        }
    }

    /// The estimate, once the batch is complete
    pub fn estimate(&self) -> Option<ClockOffsetEstimate> {
        self.estimate
    }

    /// Check if the batch is complete
    pub fn is_complete(&self) -> bool {
        self.estimate.is_some()
    }

    /// Samples recorded so far
    pub fn received(&self) -> usize {
        self.samples.len()
    }

    /// Batch size
    pub fn expected(&self) -> usize {
        self.expected
    }
}

/// A wall clock shifted onto the server's timeline
///
/// Can only be built from a finished estimate, so nothing reads corrected
/// time before calibration.
#[derive(Debug, Clone)]
pub struct CorrectedClock<C> {
    clock: C,
    estimate: ClockOffsetEstimate,
}

impl<C: WallClock> CorrectedClock<C> {
    pub fn new(clock: C, estimate: ClockOffsetEstimate) -> Self {
        Self { clock, estimate }
    }

    /// Local time plus the calibrated offset
    pub fn corrected_now(&self) -> Millis {
        self.clock.now_millis() + self.estimate.offset_millis
    }

    /// Uncorrected local time
    pub fn local_now(&self) -> Millis {
        self.clock.now_millis()
    }

    pub fn estimate(&self) -> ClockOffsetEstimate {
        self.estimate
    }

    pub fn inner(&self) -> &C {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_core::ManualClock;

    fn sample(send: Millis, server: Millis, receive: Millis) -> PingSample {
        PingSample {
            client_send: send,
            server_time: server,
            client_receive: receive,
        }
    }

    #[test]
    fn test_sample_math() {
        let s = sample(1_000.0, 6_020.0, 1_040.0);
        assert_eq!(s.latency(), 40.0);
        // server stamped at local 1020
        assert_eq!(s.raw_offset(), 5_000.0);
    }

    #[test]
    fn test_constant_offset_is_exact() {
        let mut sync = ClockSynchronizer::new(100, 0.3);
        let offset = 1_234.5;

        let mut result = None;
        for i in 0..100 {
            let send = 10_000.0 + i as f64 * 7.0;
            let receive = send + 30.0;
            result = sync.record_sample(sample(send, send + 15.0 + offset, receive));
            if i < 99 {
                assert!(result.is_none());
            }
        }

        let estimate = result.unwrap();
        assert_eq!(estimate.offset_millis, offset);
        assert_eq!(estimate.average_latency_millis, 30.0);
        assert!(sync.is_complete());
    }

    #[test]
    fn test_outliers_are_trimmed() {
        let mut sync = ClockSynchronizer::new(100, 0.3);

        for i in 0..100 {
            let send = i as f64 * 10.0;
            // 20 congestion spikes each way around a true offset of 500
            let skew = match i {
                0..=19 => 4_000.0,
                20..=39 => -4_000.0,
                _ => 0.0,
            };
            sync.record_sample(sample(send, send + 10.0 + 500.0 + skew, send + 20.0));
        }

        assert_eq!(sync.estimate().unwrap().offset_millis, 500.0);
    }

    #[test]
    fn test_latency_is_untrimmed_mean() {
        let mut sync = ClockSynchronizer::new(4, 0.25);
        sync.record_sample(sample(0.0, 5.0, 10.0));
        sync.record_sample(sample(0.0, 5.0, 10.0));
        sync.record_sample(sample(0.0, 5.0, 10.0));
        let estimate = sync.record_sample(sample(0.0, 45.0, 90.0)).unwrap();

        assert_eq!(estimate.average_latency_millis, 30.0);
        assert_eq!(estimate.offset_millis, 0.0);
    }

    #[test]
    fn test_samples_after_batch_are_ignored() {
        let mut sync = ClockSynchronizer::new(2, 0.0);
        sync.record_sample(sample(0.0, 105.0, 10.0));
        let first = sync.record_sample(sample(0.0, 105.0, 10.0)).unwrap();

        assert!(sync.record_sample(sample(0.0, 9_999.0, 10.0)).is_none());
        assert_eq!(sync.estimate(), Some(first));
        assert_eq!(sync.received(), 2);
    }

    #[test]
    fn test_incomplete_batch_has_no_estimate() {
        let mut sync = ClockSynchronizer::new(100, 0.3);
        for _ in 0..99 {
            sync.record_sample(sample(0.0, 0.0, 0.0));
        }
        assert!(!sync.is_complete());
        assert_eq!(sync.received(), 99);
        assert_eq!(sync.expected(), 100);
    }

    #[test]
    fn test_reply_completion() {
        let reply = PingReply::answer(PingRequest { client_send: 100.0 }, 900.0);
        assert_eq!(reply.client_receive, 0.0);

        let s = reply.received_at(140.0);
        assert_eq!(s.latency(), 40.0);
        assert_eq!(s.raw_offset(), 780.0);
    }

    #[test]
    fn test_corrected_clock() {
        let clock = ManualClock::new(1_000.0);
        let corrected = CorrectedClock::new(
            clock.clone(),
            ClockOffsetEstimate {
                offset_millis: 250.0,
                average_latency_millis: 12.0,
            },
        );

        assert_eq!(corrected.corrected_now(), 1_250.0);
        clock.advance(16.0);
        assert_eq!(corrected.corrected_now(), 1_266.0);
        assert_eq!(corrected.local_now(), 1_016.0);
    }
}
