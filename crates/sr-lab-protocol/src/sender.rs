//! Selective-Repeat sender (entity A).
//!
//! Up to `W` unacknowledged packets sit in a circular buffer. ACKs are
//! individual: each one marks a single slot, and the window slides only past
//! a contiguous run of acknowledged slots at its left edge.
//!
//! # Timer policy
//!
//! There is one logical timer, always bound to the oldest unacknowledged
//! packet (`timer_seq`). A timeout retransmits that packet alone. When its ACK
//! arrives the timer is rebound to the new oldest packet, or stopped if the
//! window drained.
//!
//! ```text
//!  window_first              window_last
//!       │                         │
//!  ─────┼──┬──┬──┬──┬──┬──────────┼─────▶ slots (mod W)
//!       │ 4│ 5│ 6│ 7│ 8│          │
//!       │ ·│ ✓│ ·│ ✓│ ·│
//!       └─ timer_seq = 4
//! ```

use sr_lab_abstract::{
    ConfigError, Packet, ProtocolConfig, SendError, SystemContext, TransportProtocol,
};
use tracing::trace;

use crate::checksum;
use crate::seq::SeqSpace;
use crate::stats::{SenderStats, bump};

/// Result of feeding one packet to [`SrSender::handle_ack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Checksum mismatch; dropped.
    Corrupted,
    /// First ACK for an outstanding packet. `slid` slots were released.
    New { seq: u32, slid: usize },
    /// Already acknowledged, or not in the window any more.
    Duplicate,
}

pub struct SrSender {
    config: ProtocolConfig,
    seq: SeqSpace,
    slots: Vec<Option<Packet>>,
    acked: Vec<bool>,
    window_first: usize,
    window_last: usize,
    window_count: usize,
    next_seq: u32,
    /// Sequence number the timer is bound to; `None` while it is stopped.
    timer_seq: Option<u32>,
    stats: SenderStats,
}

impl SrSender {
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: ProtocolConfig) -> Self {
        let capacity = config.window_size as usize;
        Self {
            config,
            seq: SeqSpace::new(config.window_size),
            slots: vec![None; capacity],
            acked: vec![false; capacity],
            window_first: 0,
            window_last: capacity - 1,
            window_count: 0,
            next_seq: 0,
            timer_seq: None,
            stats: SenderStats::default(),
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Drop all outstanding packets and counters, as at session start.
    /// The environment's timer is left alone; `init` stops it.
    pub fn reset(&mut self) {
        self.slots.fill(None);
        self.acked.fill(false);
        self.window_first = 0;
        self.window_last = self.capacity() - 1;
        self.window_count = 0;
        self.next_seq = 0;
        self.timer_seq = None;
        self.stats = SenderStats::default();
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    pub fn window_count(&self) -> usize {
        self.window_count
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn timer_seq(&self) -> Option<u32> {
        self.timer_seq
    }

    pub fn is_full(&self) -> bool {
        self.window_count == self.capacity()
    }

    /// Outstanding packets from oldest to newest, with their ACK flag.
    pub fn outstanding(&self) -> impl Iterator<Item = (u32, bool)> + '_ {
        self.occupied()
            .filter_map(move |idx| self.slots[idx].map(|p| (p.seqnum as u32, self.acked[idx])))
    }

    /// Slot indices holding packets, oldest first.
    fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        let capacity = self.capacity();
        (0..self.window_count).map(move |i| (self.window_first + i) % capacity)
    }

    fn find_slot(&self, seqnum: i32) -> Option<usize> {
        self.occupied()
            .find(|&idx| self.slots[idx].is_some_and(|p| p.seqnum == seqnum))
    }

    /// Packetize and transmit one application message.
    ///
    /// Returns the sequence number used, or `WindowFull` without touching
    /// the window when `W` packets are already outstanding.
    pub fn send(&mut self, ctx: &mut dyn SystemContext, data: &[u8]) -> Result<u32, SendError> {
        if self.is_full() {
            ctx.log("SR sender window full, dropping message");
            bump(ctx, "sender.window_full", &mut self.stats.window_full);
            return Err(SendError::WindowFull {
                window_size: self.config.window_size,
            });
        }

        let seq = self.next_seq;
        let packet = checksum::seal(Packet::new_data(seq as i32, data));

        self.window_last = (self.window_last + 1) % self.capacity();
        self.slots[self.window_last] = Some(packet);
        self.acked[self.window_last] = false;
        self.window_count += 1;

        ctx.log(&format!(
            "SR send seq={} ({} in flight)",
            seq, self.window_count
        ));
        ctx.send_packet(packet);
        bump(ctx, "sender.packets_sent", &mut self.stats.packets_sent);

        if self.window_count == 1 {
            ctx.start_timer(self.config.timeout_ms);
            self.timer_seq = Some(seq);
        }

        self.next_seq = self.seq.next(seq);
        Ok(seq)
    }

    /// Process one packet arriving from the receiver.
    pub fn handle_ack(&mut self, ctx: &mut dyn SystemContext, packet: &Packet) -> AckOutcome {
        if checksum::is_corrupted(packet) {
            ctx.log("SR sender dropped corrupted ACK");
            bump(ctx, "sender.corrupted_acks", &mut self.stats.corrupted_acks);
            return AckOutcome::Corrupted;
        }
        bump(ctx, "sender.acks_received", &mut self.stats.acks_received);

        let Some(idx) = self.find_slot(packet.acknum).filter(|&idx| !self.acked[idx]) else {
            ctx.log(&format!("SR duplicate ACK {}", packet.acknum));
            bump(ctx, "sender.duplicate_acks", &mut self.stats.duplicate_acks);
            return AckOutcome::Duplicate;
        };

        let seq = packet.acknum as u32;
        ctx.log(&format!("SR ACK {} is new", seq));
        bump(ctx, "sender.new_acks", &mut self.stats.new_acks);
        self.acked[idx] = true;

        let mut slid = 0;
        while self.window_count > 0 && self.acked[self.window_first] {
            self.acked[self.window_first] = false;
            self.slots[self.window_first] = None;
            self.window_first = (self.window_first + 1) % self.capacity();
            self.window_count -= 1;
            slid += 1;
        }
        if slid > 0 {
            trace!(slid, window_first = self.window_first, "sender window slid");
        }

        if self.timer_seq == Some(seq) {
            ctx.stop_timer();
            self.timer_seq = None;
            if let Some(oldest) = self.slots[self.window_first].filter(|_| self.window_count > 0) {
                ctx.start_timer(self.config.timeout_ms);
                self.timer_seq = Some(oldest.seqnum as u32);
            }
        }

        AckOutcome::New { seq, slid }
    }

    /// Retransmit the packet the timer is bound to and re-arm the timer.
    ///
    /// Returns the retransmitted sequence number, or `None` for a stray fire
    /// while nothing is outstanding.
    pub fn handle_timeout(&mut self, ctx: &mut dyn SystemContext) -> Option<u32> {
        let Some(seq) = self.timer_seq else {
            ctx.log("SR sender timer fired with nothing outstanding");
            return None;
        };
        let packet = self.find_slot(seq as i32).and_then(|idx| self.slots[idx])?;

        ctx.log(&format!("SR timeout, retransmitting seq {}", seq));
        ctx.send_packet(packet);
        bump(ctx, "sender.packets_resent", &mut self.stats.packets_resent);
        ctx.start_timer(self.config.timeout_ms);
        Some(seq)
    }
}

impl TransportProtocol for SrSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.reset();
        ctx.stop_timer();
        ctx.log(&format!(
            "SR sender ready (window {}, seq space {})",
            self.config.window_size,
            self.config.seq_space()
        ));
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        self.handle_ack(ctx, &packet);
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext) {
        self.handle_timeout(ctx);
    }

    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, data: &[u8]) -> Result<(), SendError> {
        self.send(ctx, data).map(|_| ())
    }
}
