//! Selective-Repeat receiver (entity B).
//!
//! Slot 0 of the buffer always holds `rcv_base`. Packets up to `W - 1` ahead
//! of the base are buffered; whenever slot 0 fills, the contiguous prefix is
//! delivered and the buffer shifts left. Every uncorrupted packet is ACKed
//! individually, including duplicates of packets already delivered, since
//! their earlier ACK may have been lost.

use sr_lab_abstract::{
    ConfigError, Packet, ProtocolConfig, SendError, SystemContext, TransportProtocol,
};
use tracing::trace;

use crate::checksum;
use crate::seq::SeqSpace;
use crate::stats::{ReceiverStats, bump};

/// Result of feeding one packet to [`SrReceiver::receive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Checksum mismatch; dropped without an ACK.
    Corrupted,
    /// Stored ahead of a gap.
    Buffered { offset: u32 },
    /// Filled the base slot; `count` payloads went up in order.
    Delivered { count: usize },
    /// Already buffered; re-ACKed only.
    Duplicate,
    /// Outside the receive window (already delivered); re-ACKed only.
    OutsideWindow,
}

pub struct SrReceiver {
    config: ProtocolConfig,
    seq: SeqSpace,
    rcv_base: u32,
    slots: Vec<Option<Packet>>,
    received: Vec<bool>,
    /// Alternating 0/1 value placed in the ACK's own seqnum field.
    ack_seq: i32,
    stats: ReceiverStats,
}

impl SrReceiver {
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: ProtocolConfig) -> Self {
        let capacity = config.window_size as usize;
        Self {
            config,
            seq: SeqSpace::new(config.window_size),
            rcv_base: 0,
            slots: vec![None; capacity],
            received: vec![false; capacity],
            ack_seq: 0,
            stats: ReceiverStats::default(),
        }
    }

    pub fn reset(&mut self) {
        self.rcv_base = 0;
        self.slots.fill(None);
        self.received.fill(false);
        self.ack_seq = 0;
        self.stats = ReceiverStats::default();
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    pub fn rcv_base(&self) -> u32 {
        self.rcv_base
    }

    /// Sequence numbers currently buffered ahead of a gap.
    pub fn buffered(&self) -> Vec<u32> {
        self.received
            .iter()
            .enumerate()
            .filter(|&(_, &r)| r)
            .map(|(offset, _)| (self.rcv_base + offset as u32) % self.seq.modulus())
            .collect()
    }

    pub fn receive(&mut self, ctx: &mut dyn SystemContext, packet: &Packet) -> ReceiveOutcome {
        if checksum::is_corrupted(packet) {
            ctx.log(&format!(
                "SR receiver dropped corrupted packet (claims seq {})",
                packet.seqnum
            ));
            bump(ctx, "receiver.corrupted", &mut self.stats.corrupted);
            return ReceiveOutcome::Corrupted;
        }
        bump(ctx, "receiver.packets_received", &mut self.stats.packets_received);

        let outcome = match self
            .seq
            .offset(self.rcv_base, packet.seqnum)
            .filter(|&off| off < self.seq.window())
        {
            Some(offset) if self.received[offset as usize] => {
                ctx.log(&format!("SR duplicate seq {} already buffered", packet.seqnum));
                bump(ctx, "receiver.duplicates", &mut self.stats.duplicates);
                ReceiveOutcome::Duplicate
            }
            Some(offset) => {
                self.slots[offset as usize] = Some(*packet);
                self.received[offset as usize] = true;
                if offset == 0 {
                    ReceiveOutcome::Delivered {
                        count: self.drain(ctx),
                    }
                } else {
                    ctx.log(&format!(
                        "SR buffered seq {} (base {})",
                        packet.seqnum, self.rcv_base
                    ));
                    ReceiveOutcome::Buffered { offset }
                }
            }
            None => {
                ctx.log(&format!(
                    "SR seq {} outside window (base {}), re-ACK only",
                    packet.seqnum, self.rcv_base
                ));
                bump(ctx, "receiver.out_of_window", &mut self.stats.out_of_window);
                ReceiveOutcome::OutsideWindow
            }
        };

        self.send_ack(ctx, packet.seqnum);
        outcome
    }

    /// Deliver the received prefix starting at slot 0.
    fn drain(&mut self, ctx: &mut dyn SystemContext) -> usize {
        let mut count = 0;
        while self.received[0] {
            if let Some(packet) = self.slots[0].take() {
                ctx.log(&format!("SR deliver seq {}", packet.seqnum));
                ctx.deliver_data(&packet.payload);
                bump(ctx, "receiver.packets_delivered", &mut self.stats.packets_delivered);
            }
            self.received[0] = false;
            self.slots.rotate_left(1);
            self.received.rotate_left(1);
            self.rcv_base = self.seq.next(self.rcv_base);
            count += 1;
        }
        trace!(count, rcv_base = self.rcv_base, "receiver window slid");
        count
    }

    fn send_ack(&mut self, ctx: &mut dyn SystemContext, acknum: i32) {
        let ack = checksum::seal(Packet::new_ack(self.ack_seq, acknum));
        self.ack_seq ^= 1;
        ctx.send_packet(ack);
        bump(ctx, "receiver.acks_sent", &mut self.stats.acks_sent);
    }
}

impl TransportProtocol for SrReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.reset();
        ctx.log(&format!(
            "SR receiver ready (window {}, seq space {})",
            self.config.window_size,
            self.config.seq_space()
        ));
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        self.receive(ctx, &packet);
    }

    fn on_timer(&mut self, _ctx: &mut dyn SystemContext) {
        // Receiver never arms a timer
    }

    fn on_app_data(&mut self, _ctx: &mut dyn SystemContext, _data: &[u8]) -> Result<(), SendError> {
        Err(SendError::Unsupported)
    }
}
