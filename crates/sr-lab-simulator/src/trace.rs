use serde::Serialize;
use sr_lab_abstract::SimConfig;
use std::collections::HashMap;

use crate::engine::LinkEventSummary;

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration_ms: u64,
    pub delivered_data: Vec<Vec<u8>>,
    pub accepted_sends: Vec<Vec<u8>>,
    pub rejected_sends: u32,
    pub sender_packet_count: u32,
    pub receiver_packet_count: u32,
    pub metrics: HashMap<String, Vec<(u64, f64)>>,
    pub link_events: Vec<LinkEventSummary>,
}

impl SimulationReport {
    /// Sender transmissions beyond the first copy of each accepted message.
    pub fn retransmissions(&self) -> u32 {
        self.sender_packet_count
            .saturating_sub(self.accepted_sends.len() as u32)
    }

    /// Every accepted message reached the application exactly once, in order.
    pub fn delivered_in_order(&self) -> bool {
        self.delivered_data == self.accepted_sends
    }

    /// Final value of a counter metric, or 0 if it was never recorded.
    pub fn final_metric(&self, name: &str) -> f64 {
        self.metrics
            .get(name)
            .and_then(|series| series.last())
            .map_or(0.0, |&(_, v)| v)
    }
}
