use crate::trace::SimulationReport;
use rand::Rng;
use serde::Serialize;
use sr_lab_abstract::{ConfigError, PAYLOAD_LEN, Packet, SimConfig, packet::to_payload};
use sr_lab_abstract::{SystemContext, TransportProtocol};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
pub enum EventType {
    PacketArrival { to: NodeId, packet: Packet },
    TimerExpiry { node: NodeId, generation: u64 },
    AppSend { data: Vec<u8> },
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for time: smallest time is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A compact textual summary of important link-layer events.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: u64,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerOp {
    Start(u64),
    Stop,
}

/// Actions buffered during one handler call, applied once it returns.
#[derive(Default)]
struct ActionBuffer {
    outgoing_packets: Vec<Packet>,
    /// Kept in call order: a stop followed by a start leaves the timer armed.
    timer_ops: Vec<TimerOp>,
    logs: Vec<String>,
    delivered_data: Vec<Vec<u8>>,
    metrics: Vec<(String, f64)>,
}

/// Context implementation passed to the protocol entity
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: u64,
}

impl<'a> SystemContext for ScopedContext<'a> {
    fn send_packet(&mut self, packet: Packet) {
        self.buffer.outgoing_packets.push(packet);
    }

    fn start_timer(&mut self, delay_ms: u64) {
        self.buffer.timer_ops.push(TimerOp::Start(delay_ms));
    }

    fn stop_timer(&mut self) {
        self.buffer.timer_ops.push(TimerOp::Stop);
    }

    fn deliver_data(&mut self, data: &[u8]) {
        self.buffer.delivered_data.push(data.to_vec());
    }

    fn log(&mut self, message: &str) {
        self.buffer.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.buffer.metrics.push((name.to_string(), value));
    }
}

/// One timer per node. Every start or stop bumps the generation, so an
/// expiry event carrying an older generation has been superseded.
#[derive(Debug, Default, Clone, Copy)]
struct TimerSlot {
    generation: u64,
    armed: bool,
}

pub struct Simulator {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: SimConfig,
    rng: rand::rngs::StdRng,

    pub sender: Box<dyn TransportProtocol>,
    pub receiver: Box<dyn TransportProtocol>,

    // Stats for Grader
    pub delivered_data: Vec<Vec<u8>>,
    /// Payloads (padded to the wire length) the sender accepted, in order.
    pub accepted_sends: Vec<Vec<u8>>,
    pub rejected_sends: u32,
    pub sender_packet_count: u32,
    pub receiver_packet_count: u32,

    /// Arbitrary time-series metrics recorded via `SystemContext::record_metric`
    /// Key: metric name (e.g., "sender.packets_resent"), Value: Vec<(time_ms, value)>
    pub metrics: HashMap<String, Vec<(u64, f64)>>,

    // Deterministic fault injection, each entry consumed by its first match
    drop_sender_seq_once: Vec<i32>,
    drop_receiver_ack_once: Vec<i32>,
    corrupt_sender_seq_once: Vec<i32>,

    /// Timeline of link events (drops, corruptions, sends, deliveries).
    pub link_events: Vec<LinkEventSummary>,

    timers: HashMap<NodeId, TimerSlot>,
}

impl Simulator {
    /// Fails if the channel configuration does not validate.
    pub fn new(
        config: SimConfig,
        sender: Box<dyn TransportProtocol>,
        receiver: Box<dyn TransportProtocol>,
    ) -> Result<Self, ConfigError> {
        use rand::SeedableRng;
        config.validate()?;
        let rng = rand::rngs::StdRng::seed_from_u64(config.seed);

        Ok(Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config,
            rng,
            sender,
            receiver,
            delivered_data: Vec::new(),
            accepted_sends: Vec::new(),
            rejected_sends: 0,
            sender_packet_count: 0,
            receiver_packet_count: 0,
            metrics: HashMap::new(),
            drop_sender_seq_once: Vec::new(),
            drop_receiver_ack_once: Vec::new(),
            corrupt_sender_seq_once: Vec::new(),
            link_events: Vec::new(),
            timers: HashMap::new(),
        })
    }

    /// Register a deterministic fault: drop the first packet sent by Sender whose seq equals `seq`.
    pub fn add_drop_sender_seq_once(&mut self, seq: i32) {
        self.drop_sender_seq_once.push(seq);
    }

    /// Register a deterministic fault: drop the first ACK sent by Receiver whose ack equals `ack`.
    pub fn add_drop_receiver_ack_once(&mut self, ack: i32) {
        self.drop_receiver_ack_once.push(ack);
    }

    /// Register a deterministic fault: corrupt the first packet sent by Sender whose seq equals `seq`.
    pub fn add_corrupt_sender_seq_once(&mut self, seq: i32) {
        self.corrupt_sender_seq_once.push(seq);
    }

    /// Whether `node` currently has an armed timer.
    pub fn timer_running(&self, node: NodeId) -> bool {
        self.timers.get(&node).is_some_and(|t| t.armed)
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn schedule_app_send(&mut self, time: u64, data: Vec<u8>) {
        self.push_event(time, EventType::AppSend { data });
    }

    /// Schedule `count` messages, one every `interval` ms from `start`.
    /// Message `i` is `PAYLOAD_LEN` copies of the letter `'a' + i % 26`.
    pub fn schedule_message_stream(&mut self, start: u64, count: u32, interval: u64) {
        for i in 0..count {
            let letter = b'a' + (i % 26) as u8;
            let time = start.saturating_add(u64::from(i).saturating_mul(interval));
            self.schedule_app_send(time, vec![letter; PAYLOAD_LEN]);
        }
    }

    pub fn init(&mut self) {
        let mut buffer = ActionBuffer::default();
        let mut ctx = ScopedContext {
            buffer: &mut buffer,
            now: self.time,
        };
        self.sender.init(&mut ctx);
        self.process_actions(NodeId::Sender, buffer);

        let mut buffer = ActionBuffer::default();
        let mut ctx = ScopedContext {
            buffer: &mut buffer,
            now: self.time,
        };
        self.receiver.init(&mut ctx);
        self.process_actions(NodeId::Receiver, buffer);
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    fn node_mut(&mut self, node: NodeId) -> &mut dyn TransportProtocol {
        match node {
            NodeId::Sender => self.sender.as_mut(),
            NodeId::Receiver => self.receiver.as_mut(),
        }
    }

    /// Process the next event. Returns true if an event was processed, false if queue is empty.
    pub fn step(&mut self) -> bool {
        let Some(event) = self.event_queue.pop() else {
            return false;
        };

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        let mut buffer = ActionBuffer::default();
        let now = self.time;
        let node = match event.event_type {
            EventType::PacketArrival { to, packet } => {
                let mut ctx = ScopedContext {
                    buffer: &mut buffer,
                    now,
                };
                self.node_mut(to).on_packet(&mut ctx, packet);
                to
            }
            EventType::TimerExpiry { node, generation } => {
                let slot = self.timers.entry(node).or_default();
                if !slot.armed || slot.generation != generation {
                    debug!("Skipping superseded timer event for {:?}", node);
                    return true;
                }
                slot.armed = false;

                let mut ctx = ScopedContext {
                    buffer: &mut buffer,
                    now,
                };
                self.node_mut(node).on_timer(&mut ctx);
                node
            }
            EventType::AppSend { data } => {
                let mut ctx = ScopedContext {
                    buffer: &mut buffer,
                    now,
                };
                match self.sender.on_app_data(&mut ctx, &data) {
                    Ok(()) => self.accepted_sends.push(to_payload(&data).to_vec()),
                    Err(err) => {
                        self.rejected_sends += 1;
                        self.link_events.push(LinkEventSummary {
                            time: now,
                            description: format!("[Sender] REJECTED application message: {err}"),
                        });
                        info!("[Sender] application message rejected: {}", err);
                    }
                }
                NodeId::Sender
            }
        };
        self.process_actions(node, buffer);
        true
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            duration_ms: self.time,
            delivered_data: self.delivered_data.clone(),
            accepted_sends: self.accepted_sends.clone(),
            rejected_sends: self.rejected_sends,
            sender_packet_count: self.sender_packet_count,
            receiver_packet_count: self.receiver_packet_count,
            metrics: self.metrics.clone(),
            link_events: self.link_events.clone(),
        }
    }

    pub fn run_until_complete(&mut self) {
        self.init();
        while self.step() {}
    }

    /// Step until the queue drains or the clock passes `limit_ms`.
    /// Returns `true` if the queue drained. `init` must have been called.
    pub fn run_until(&mut self, limit_ms: u64) -> bool {
        while self.peek_next_event_time().is_some_and(|t| t <= limit_ms) {
            self.step();
        }
        self.event_queue.is_empty()
    }

    fn apply_timer_op(&mut self, node: NodeId, op: TimerOp) {
        let slot = self.timers.entry(node).or_default();
        slot.generation += 1;
        match op {
            TimerOp::Start(delay) => {
                slot.armed = true;
                let generation = slot.generation;
                let deadline = self.time.saturating_add(delay);
                self.push_event(deadline, EventType::TimerExpiry { node, generation });
            }
            TimerOp::Stop => slot.armed = false,
        }
    }

    fn take_once(list: &mut Vec<i32>, value: i32) -> bool {
        match list.iter().position(|v| *v == value) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Alter one field so the packet no longer matches its checksum.
    fn corrupt(&mut self, packet: &mut Packet) {
        let mask = self.rng.random_range(1..=u8::MAX);
        match self.rng.random_range(0..4) {
            0 => packet.seqnum ^= i32::from(mask),
            1 => packet.acknum ^= i32::from(mask),
            2 => packet.checksum ^= i32::from(mask),
            _ => {
                let idx = self.rng.random_range(0..PAYLOAD_LEN);
                packet.payload[idx] ^= mask;
            }
        }
    }

    fn process_actions(&mut self, source_node: NodeId, buffer: ActionBuffer) {
        // First, fold metrics into simulator-wide store
        for (name, value) in buffer.metrics {
            self.metrics
                .entry(name)
                .or_default()
                .push((self.time, value));
        }

        for log in buffer.logs {
            info!("[{:?}] {}", source_node, log);
        }

        for data in buffer.delivered_data {
            info!("[{:?}] DELIVERED DATA: {} bytes", source_node, data.len());
            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}] DELIVERED {} bytes to application",
                    source_node,
                    data.len()
                ),
            });
            self.delivered_data.push(data);
        }

        for op in buffer.timer_ops {
            self.apply_timer_op(source_node, op);
        }

        // Packet transmission logic (Channel)
        for mut packet in buffer.outgoing_packets {
            let target_node = source_node.peer();
            let mut corrupt = false;

            match source_node {
                NodeId::Sender => {
                    self.sender_packet_count += 1;

                    if Self::take_once(&mut self.drop_sender_seq_once, packet.seqnum) {
                        self.link_events.push(LinkEventSummary {
                            time: self.time,
                            description: format!(
                                "[Sender->Receiver] DROP (deterministic seq) seq={}",
                                packet.seqnum
                            ),
                        });
                        debug!(
                            "Deterministically dropping sender packet with seq={}",
                            packet.seqnum
                        );
                        continue;
                    }
                    corrupt = Self::take_once(&mut self.corrupt_sender_seq_once, packet.seqnum);
                }
                NodeId::Receiver => {
                    self.receiver_packet_count += 1;

                    if packet.is_ack()
                        && Self::take_once(&mut self.drop_receiver_ack_once, packet.acknum)
                    {
                        self.link_events.push(LinkEventSummary {
                            time: self.time,
                            description: format!(
                                "[Receiver->Sender] DROP (deterministic ack) ack={}",
                                packet.acknum
                            ),
                        });
                        debug!(
                            "Deterministically dropping receiver ACK with ack={}",
                            packet.acknum
                        );
                        continue;
                    }
                }
            }

            // 1. Check Loss
            if self.rng.random::<f64>() < self.config.loss_rate {
                self.link_events.push(LinkEventSummary {
                    time: self.time,
                    description: format!(
                        "[{:?}->{:?}] DROP (random loss) seq={} ack={}",
                        source_node, target_node, packet.seqnum, packet.acknum
                    ),
                });
                debug!("Packet lost in channel");
                continue;
            }

            // 2. Check Corruption
            if corrupt || self.rng.random::<f64>() < self.config.corrupt_rate {
                self.link_events.push(LinkEventSummary {
                    time: self.time,
                    description: format!(
                        "[{:?}->{:?}] CORRUPT seq={} ack={}",
                        source_node, target_node, packet.seqnum, packet.acknum
                    ),
                });
                debug!("Packet corrupted in channel");
                self.corrupt(&mut packet);
            }

            // 3. Calculate Latency
            let latency = self
                .rng
                .random_range(self.config.min_latency..=self.config.max_latency);
            let arrival_time = self.time.saturating_add(latency);

            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}->{:?}] SEND seq={} ack={} (latency={}ms)",
                    source_node, target_node, packet.seqnum, packet.acknum, latency
                ),
            });

            self.push_event(
                arrival_time,
                EventType::PacketArrival {
                    to: target_node,
                    packet,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NodeId, Simulator};
    use sr_lab_abstract::{
        ConfigError, Packet, SendError, SimConfig, SystemContext, TransportProtocol,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records timer callbacks into shared state the test can inspect.
    struct TimerProbe {
        fired: Rc<RefCell<Vec<u64>>>,
        script: fn(&mut dyn SystemContext),
        /// Delay to restart the timer with on the first expiry.
        rearm: Option<u64>,
    }

    impl TransportProtocol for TimerProbe {
        fn init(&mut self, ctx: &mut dyn SystemContext) {
            (self.script)(ctx);
        }

        fn on_packet(&mut self, _ctx: &mut dyn SystemContext, _packet: Packet) {}

        fn on_timer(&mut self, ctx: &mut dyn SystemContext) {
            self.fired.borrow_mut().push(ctx.now());
            if let Some(delay) = self.rearm.take() {
                ctx.start_timer(delay);
            }
        }

        fn on_app_data(
            &mut self,
            _ctx: &mut dyn SystemContext,
            _data: &[u8],
        ) -> Result<(), SendError> {
            Err(SendError::Unsupported)
        }
    }

    fn idle() -> Box<TimerProbe> {
        Box::new(TimerProbe {
            fired: Rc::new(RefCell::new(Vec::new())),
            script: |_| {},
            rearm: None,
        })
    }

    fn probe_sim(script: fn(&mut dyn SystemContext)) -> (Simulator, Rc<RefCell<Vec<u64>>>) {
        rearming_sim(script, None)
    }

    fn rearming_sim(
        script: fn(&mut dyn SystemContext),
        rearm: Option<u64>,
    ) -> (Simulator, Rc<RefCell<Vec<u64>>>) {
        let fired = Rc::new(RefCell::new(Vec::new()));
        let sender = Box::new(TimerProbe {
            fired: fired.clone(),
            script,
            rearm,
        });
        let receiver = idle();
        let sim = Simulator::new(SimConfig::default(), sender, receiver).unwrap();
        (sim, fired)
    }

    #[test]
    fn test_stop_timer() {
        let (mut sim, fired) = probe_sim(|ctx| {
            ctx.start_timer(10);
            ctx.stop_timer();
        });
        sim.run_until_complete();
        assert!(fired.borrow().is_empty(), "Stopped timer should not fire");
        assert!(!sim.timer_running(NodeId::Sender));
    }

    #[test]
    fn test_restart_rearms_timer() {
        let (mut sim, fired) = probe_sim(|ctx| {
            ctx.start_timer(10);
            ctx.start_timer(25);
        });
        sim.run_until_complete();
        assert_eq!(*fired.borrow(), vec![25], "Only the latest deadline fires");
    }

    #[test]
    fn test_stop_then_start_leaves_timer_armed() {
        let (mut sim, fired) = probe_sim(|ctx| {
            ctx.stop_timer();
            ctx.start_timer(7);
        });
        sim.init();
        assert!(sim.timer_running(NodeId::Sender));
        while sim.step() {}
        assert_eq!(*fired.borrow(), vec![7]);
        assert!(!sim.timer_running(NodeId::Sender));
    }

    #[test]
    fn test_inverted_latency_range_is_rejected() {
        let config = SimConfig {
            min_latency: 20,
            max_latency: 5,
            ..Default::default()
        };
        assert_eq!(
            Simulator::new(config, idle(), idle()).err(),
            Some(ConfigError::LatencyRange { min: 20, max: 5 })
        );
    }

    #[test]
    fn test_timer_deadline_saturates_instead_of_overflowing() {
        let (mut sim, fired) = rearming_sim(|ctx| ctx.start_timer(10), Some(u64::MAX));
        sim.init();
        assert!(sim.step());
        assert_eq!(*fired.borrow(), vec![10]);
        assert_eq!(sim.peek_next_event_time(), Some(u64::MAX));
        assert!(sim.run_until(u64::MAX));
        assert_eq!(*fired.borrow(), vec![10, u64::MAX]);
    }

    #[test]
    fn test_rejected_app_data_is_counted() {
        let (mut sim, _) = probe_sim(|_| {});
        sim.schedule_app_send(5, b"hello".to_vec());
        sim.run_until_complete();
        assert_eq!(sim.rejected_sends, 1);
        assert!(sim.accepted_sends.is_empty());
    }

    #[test]
    fn test_message_stream_cycles_letters() {
        let (mut sim, _) = probe_sim(|_| {});
        sim.schedule_message_stream(0, 28, 5);
        assert_eq!(sim.remaining_events(), 28);
        sim.run_until_complete();
        assert_eq!(sim.current_time(), 27 * 5);
        assert_eq!(sim.rejected_sends, 28);
    }
}
