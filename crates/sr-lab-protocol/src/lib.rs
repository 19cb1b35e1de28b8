//! Selective-Repeat ARQ sender and receiver.
//!
//! Both entities implement [`TransportProtocol`] and talk to the outside
//! world only through a [`SystemContext`]: the channel, the application and
//! the single per-entity timer.

pub mod checksum;
pub mod receiver;
pub mod sender;
pub mod seq;
pub mod stats;

#[cfg(test)]
mod test_support;

pub use receiver::{ReceiveOutcome, SrReceiver};
pub use sender::{AckOutcome, SrSender};
pub use seq::SeqSpace;
pub use stats::{ReceiverStats, SenderStats};

pub use sr_lab_abstract::{Packet, ProtocolConfig, SystemContext, TransportProtocol};

use sr_lab_abstract::ConfigError;

pub fn sr_sender(config: ProtocolConfig) -> Result<Box<dyn TransportProtocol>, ConfigError> {
    Ok(Box::new(SrSender::new(config)?))
}

pub fn sr_receiver(config: ProtocolConfig) -> Result<Box<dyn TransportProtocol>, ConfigError> {
    Ok(Box::new(SrReceiver::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingContext, msg};

    #[test]
    fn loopback_without_faults_empties_both_windows() {
        let config = ProtocolConfig::default();
        let mut a = SrSender::new(config).unwrap();
        let mut b = SrReceiver::new(config).unwrap();
        let mut ctx_a = RecordingContext::default();
        let mut ctx_b = RecordingContext::default();
        a.init(&mut ctx_a);
        b.init(&mut ctx_b);

        for letter in b"xyz" {
            a.on_app_data(&mut ctx_a, &msg(*letter)).unwrap();
        }
        for packet in ctx_a.sent() {
            b.on_packet(&mut ctx_b, packet);
        }
        for ack in ctx_b.sent() {
            a.on_packet(&mut ctx_a, ack);
        }

        assert_eq!(
            ctx_b.delivered(),
            vec![msg(b'x').to_vec(), msg(b'y').to_vec(), msg(b'z').to_vec()]
        );
        assert_eq!(a.window_count(), 0);
        assert!(!ctx_a.timer_running);
        assert_eq!(a.stats().packets_sent, 3);
        assert_eq!(b.stats().acks_sent, 3);
        assert_eq!(b.rcv_base(), 3);
    }

    #[test]
    fn constructors_reject_invalid_config() {
        let config = ProtocolConfig {
            window_size: 0,
            timeout_ms: 16,
        };
        assert!(sr_sender(config).is_err());
        assert!(sr_receiver(config).is_err());
    }
}
