use crate::error::SendError;
use crate::packet::Packet;

/// What the environment (channel emulator, test harness) provides to a
/// protocol entity. Every call is scoped to the entity whose handler is
/// currently running.
pub trait SystemContext {
    /// Hand a packet to the unreliable channel. No delivery guarantee.
    fn send_packet(&mut self, packet: Packet);

    /// Arm this entity's single timer to fire after `delay_ms`.
    /// Starting a running timer re-arms it with the new deadline.
    fn start_timer(&mut self, delay_ms: u64);

    /// Disarm this entity's timer. Stopping a stopped timer is a no-op.
    fn stop_timer(&mut self);

    /// Hand one in-order payload to the application layer.
    fn deliver_data(&mut self, data: &[u8]);

    /// Log a message to the simulator's debug output.
    fn log(&mut self, message: &str);

    /// Current simulation time in ms
    fn now(&self) -> u64;

    /// Record a numeric metric sample (e.g. a running counter).
    fn record_metric(&mut self, _name: &str, _value: f64) {
        // Default no-op so non-visual environments don't need to care.
    }
}

/// The four entry points of a protocol entity.
pub trait TransportProtocol {
    /// Called once when the session starts; resets all state.
    fn init(&mut self, _ctx: &mut dyn SystemContext) {}

    /// Called when a packet arrives from the channel.
    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet);

    /// Called when this entity's timer expires.
    fn on_timer(&mut self, ctx: &mut dyn SystemContext);

    /// Called when the application layer hands down a message.
    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, data: &[u8]) -> Result<(), SendError>;
}
