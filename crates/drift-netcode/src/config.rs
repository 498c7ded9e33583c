//! Netcode configuration
//!
//! Tuning constants for calibration, buffering and broadcast. Loaded from RON
//! so a client can be retuned without a rebuild.

use crate::{Error, Result};
use drift_core::Millis;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration for a synchronization session
///
/// # Example
///
/// ```
/// use drift_netcode::NetcodeConfig;
///
/// let config = NetcodeConfig::from_ron_str("(ping_samples: 20, render_delay_ms: 150.0)").unwrap();
/// assert_eq!(config.ping_samples, 20);
/// assert_eq!(config.buffer_capacity, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NetcodeConfig {
    /// Number of ping round trips collected before the offset is fixed
    pub ping_samples: usize,
    /// Share of sorted offsets dropped from each end before averaging
    pub trim_ratio: f64,
    /// Snapshots kept per remote entity
    pub buffer_capacity: usize,
    /// How far behind the corrected clock remote entities are sampled
    pub render_delay_ms: Millis,
    /// Period of the outbound local-entity update
    pub broadcast_interval_ms: Millis,
    /// How long calibration may take before the session gives up
    pub calibration_timeout_ms: Millis,
}

impl NetcodeConfig {
    /// Parse and validate a RON document
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: NetcodeConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_ron_str(&text)
    }

    /// Render as pretty RON
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Check that every value can drive a session
    pub fn validate(&self) -> Result<()> {
        if self.ping_samples == 0 {
            return Err(Error::InvalidConfig("ping_samples must be at least 1".into()));
        }
        if !(0.0..0.5).contains(&self.trim_ratio) {
            return Err(Error::InvalidConfig(format!(
                "trim_ratio {} outside [0, 0.5)",
                self.trim_ratio
            )));
        }
        if self.kept_samples() == 0 {
            return Err(Error::InvalidConfig(format!(
                "trim_ratio {} leaves no samples out of {}",
                self.trim_ratio, self.ping_samples
            )));
        }
        // interpolation needs a pair
        if self.buffer_capacity < 2 {
            return Err(Error::InvalidConfig(format!(
                "buffer_capacity {} must be at least 2",
                self.buffer_capacity
            )));
        }
        for (name, value) in [
            ("render_delay_ms", self.render_delay_ms),
            ("broadcast_interval_ms", self.broadcast_interval_ms),
            ("calibration_timeout_ms", self.calibration_timeout_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.broadcast_interval_ms == 0.0 {
            return Err(Error::InvalidConfig("broadcast_interval_ms must be positive".into()));
        }
        Ok(())
    }

    /// Number of samples dropped from each end of the sorted offsets
    pub fn trimmed_per_side(&self) -> usize {
        (self.ping_samples as f64 * self.trim_ratio).floor() as usize
    }

    /// Number of offsets that enter the trimmed mean
    pub fn kept_samples(&self) -> usize {
        self.ping_samples
            .saturating_sub(2 * self.trimmed_per_side())
    }

    pub fn with_ping_samples(mut self, samples: usize) -> Self {
        self.ping_samples = samples;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_render_delay(mut self, delay: Millis) -> Self {
        self.render_delay_ms = delay;
        self
    }

    pub fn with_calibration_timeout(mut self, timeout: Millis) -> Self {
        self.calibration_timeout_ms = timeout;
        self
    }
}

impl Default for NetcodeConfig {
    fn default() -> Self {
        Self {
            ping_samples: 100,
            trim_ratio: 0.3,
            buffer_capacity: 10,
            render_delay_ms: 200.0,
            broadcast_interval_ms: 100.0,
            calibration_timeout_ms: 5_000.0,
        }
    }
}
