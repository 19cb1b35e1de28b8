use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Channel behaviour of the emulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            min_latency: 1,
            max_latency: 10,
            seed: 0,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_rate("loss_rate", self.loss_rate)?;
        check_rate("corrupt_rate", self.corrupt_rate)?;
        if self.min_latency > self.max_latency {
            return Err(ConfigError::LatencyRange {
                min: self.min_latency,
                max: self.max_latency,
            });
        }
        Ok(())
    }
}

fn check_rate(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RateOutOfRange { name, value })
    }
}

/// Upper bound on `ProtocolConfig::timeout_ms` (one hour of simulated time).
pub const MAX_TIMEOUT_MS: u64 = 3_600_000;

/// Selective-Repeat parameters, fixed for the lifetime of a run.
///
/// The sequence space is always `2 * window_size`; it is derived, never
/// configured on its own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub window_size: u32,
    /// Retransmission timeout in simulation milliseconds.
    pub timeout_ms: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            window_size: 6,
            timeout_ms: 16,
        }
    }
}

impl ProtocolConfig {
    pub fn new(window_size: u32, timeout_ms: u64) -> Result<Self, ConfigError> {
        let config = Self {
            window_size,
            timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn seq_space(&self) -> u32 {
        self.window_size * 2
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        // seqnum travels as i32
        if self.window_size > (i32::MAX as u32) / 2 {
            return Err(ConfigError::WindowTooLarge(self.window_size));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::TimeoutTooLarge(self.timeout_ms));
        }
        Ok(())
    }
}
