//! Additive integrity code.
//!
//! The sum covers `seqnum`, `acknum` and every payload byte, in wrapping
//! `i32` arithmetic. It catches any single-field change but not
//! multi-byte corruptions whose deltas cancel out.

use sr_lab_abstract::Packet;

pub fn compute(packet: &Packet) -> i32 {
    packet
        .payload
        .iter()
        .fold(packet.seqnum.wrapping_add(packet.acknum), |sum, &b| {
            sum.wrapping_add(i32::from(b))
        })
}

pub fn is_corrupted(packet: &Packet) -> bool {
    packet.checksum != compute(packet)
}

/// Fill in the checksum of a freshly built packet.
pub fn seal(mut packet: Packet) -> Packet {
    packet.checksum = compute(&packet);
    packet
}
