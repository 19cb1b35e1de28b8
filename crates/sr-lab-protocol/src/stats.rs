//! Per-entity counters.
//!
//! Each entity owns its counters; every increment is mirrored to
//! `SystemContext::record_metric` so the environment can chart or grade them.

use sr_lab_abstract::SystemContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// First transmissions of new packets.
    pub packets_sent: u32,
    pub packets_resent: u32,
    /// Application messages rejected because the window was full.
    pub window_full: u32,
    /// Uncorrupted ACKs seen, new or not.
    pub acks_received: u32,
    pub new_acks: u32,
    pub duplicate_acks: u32,
    pub corrupted_acks: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Uncorrupted data packets seen.
    pub packets_received: u32,
    pub packets_delivered: u32,
    /// Packets already buffered in the window.
    pub duplicates: u32,
    /// Packets outside the receive window (already delivered).
    pub out_of_window: u32,
    pub corrupted: u32,
    pub acks_sent: u32,
}

pub(crate) fn bump(ctx: &mut dyn SystemContext, name: &str, counter: &mut u32) {
    *counter += 1;
    ctx.record_metric(name, f64::from(*counter));
}
