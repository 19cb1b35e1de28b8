use crate::config::{ProtocolConfig, SimConfig};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: SimConfigOverride,
    #[serde(default)]
    pub protocol: ProtocolConfigOverride,
    #[serde(default)]
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub loss_rate: Option<f64>,
    pub corrupt_rate: Option<f64>,
    pub min_latency: Option<u64>,
    pub max_latency: Option<u64>,
    pub seed: Option<u64>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.corrupt_rate {
            config.corrupt_rate = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProtocolConfigOverride {
    pub window_size: Option<u32>,
    pub timeout_ms: Option<u64>,
}

impl ProtocolConfigOverride {
    pub fn apply_to(&self, config: &mut ProtocolConfig) {
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.timeout_ms {
            config.timeout_ms = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Application sends data at a specific time
    AppSend { time: u64, data: String },
    /// Generate `count` 20-byte messages ("aaa…", "bbb…", …) every `interval` ms
    MessageStream {
        start: u64,
        count: u32,
        interval: u64,
    },
    /// Deterministically drop the first packet sent by Sender with given seq number
    DropNextFromSenderSeq { seq: i32 },
    /// Deterministically drop the first ACK sent by Receiver with given ack number
    DropNextFromReceiverAck { ack: i32 },
    /// Deterministically corrupt the first packet sent by Sender with given seq number
    CorruptNextFromSenderSeq { seq: i32 },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Assert that specific data was delivered to the application layer
    DataDelivered { data: String },
    /// Assert the exact number of payloads delivered to the application
    DeliveredCount { count: usize },
    /// Assert that every accepted send was delivered exactly once, in order
    DeliveredInOrder,
    /// Assert that the total number of packets sent by Sender is within range
    SenderPacketCount { min: u32, max: Option<u32> },
    /// Assert that the number of sender retransmissions is within range
    Retransmissions { min: u32, max: Option<u32> },
    /// Assert that the number of window-full rejections is within range
    RejectedSends { min: u32, max: Option<u32> },
    /// Assert that simulation finishes within time
    MaxDuration { ms: u64 },
}
