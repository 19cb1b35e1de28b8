use sr_lab_abstract::{Packet, SystemContext};

/// What a handler asked the environment to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Send(Packet),
    StartTimer(u64),
    StopTimer,
    Deliver(Vec<u8>),
}

/// A `SystemContext` that records every call and tracks the timer state.
#[derive(Default)]
pub struct RecordingContext {
    pub actions: Vec<Action>,
    pub logs: Vec<String>,
    pub metrics: Vec<(String, f64)>,
    pub timer_running: bool,
}

impl RecordingContext {
    pub fn sent(&self) -> Vec<Packet> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn delivered(&self) -> Vec<Vec<u8>> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Deliver(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
        self.logs.clear();
        self.metrics.clear();
    }
}

impl SystemContext for RecordingContext {
    fn send_packet(&mut self, packet: Packet) {
        self.actions.push(Action::Send(packet));
    }

    fn start_timer(&mut self, delay_ms: u64) {
        self.timer_running = true;
        self.actions.push(Action::StartTimer(delay_ms));
    }

    fn stop_timer(&mut self) {
        self.timer_running = false;
        self.actions.push(Action::StopTimer);
    }

    fn deliver_data(&mut self, data: &[u8]) {
        self.actions.push(Action::Deliver(data.to_vec()));
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        0
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.metrics.push((name.to_string(), value));
    }
}

/// 20-byte message made of one repeated letter, like the emulator's stream.
pub fn msg(letter: u8) -> [u8; 20] {
    [letter; 20]
}
