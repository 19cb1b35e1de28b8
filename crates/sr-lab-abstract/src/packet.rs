use serde::{Deserialize, Serialize};

/// Fixed payload length carried by every packet.
pub const PAYLOAD_LEN: usize = 20;

/// Sentinel stored in `acknum` by data packets.
pub const NOT_IN_USE: i32 = -1;

/// The single wire shape shared by data packets and ACKs.
///
/// Data packets carry `acknum == NOT_IN_USE`; ACKs carry the acknowledged
/// sequence number in `acknum` and a 0/1 counter in `seqnum`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Packet {
    /// Sequence number
    pub seqnum: i32,
    /// Acknowledged sequence number, or `NOT_IN_USE`
    pub acknum: i32,
    /// Integrity code over every other field
    pub checksum: i32,
    pub payload: [u8; PAYLOAD_LEN],
}

impl Packet {
    /// Data packet with the payload copied from `data`.
    ///
    /// Longer input is truncated and shorter input zero-padded. The checksum
    /// is left at zero; the protocol fills it in before sending.
    pub fn new_data(seqnum: i32, data: &[u8]) -> Self {
        Self {
            seqnum,
            acknum: NOT_IN_USE,
            checksum: 0,
            payload: to_payload(data),
        }
    }

    /// Pure ACK packet with an all-zero payload (checksum left at zero).
    pub fn new_ack(seqnum: i32, acknum: i32) -> Self {
        Self {
            seqnum,
            acknum,
            checksum: 0,
            payload: [0; PAYLOAD_LEN],
        }
    }

    pub fn is_ack(&self) -> bool {
        self.acknum != NOT_IN_USE
    }
}

/// Copy up to `PAYLOAD_LEN` bytes of `data` into a zero-padded payload.
pub fn to_payload(data: &[u8]) -> [u8; PAYLOAD_LEN] {
    let mut payload = [0u8; PAYLOAD_LEN];
    let n = data.len().min(PAYLOAD_LEN);
    payload[..n].copy_from_slice(&data[..n]);
    payload
}
