use thiserror::Error;

/// Why an application message was not accepted by a protocol entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// All `window_size` slots hold unacknowledged packets. The message is
    /// dropped; the caller may re-issue it later.
    #[error("send window full ({window_size} packets outstanding)")]
    WindowFull { window_size: u32 },

    /// The entity only receives (simplex configuration).
    #[error("entity does not accept application data")]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    ZeroWindow,

    #[error("window size {0} is too large for the sequence number field")]
    WindowTooLarge(u32),

    #[error("retransmission timeout must be non-zero")]
    ZeroTimeout,

    #[error("retransmission timeout {0} ms exceeds the one-hour limit")]
    TimeoutTooLarge(u64),

    #[error("{name} must be within [0, 1], got {value}")]
    RateOutOfRange { name: &'static str, value: f64 },

    #[error("min_latency ({min}) exceeds max_latency ({max})")]
    LatencyRange { min: u64, max: u64 },
}
