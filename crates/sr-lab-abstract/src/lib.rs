pub mod config;
pub mod error;
pub mod interface;
pub mod packet;
pub mod scenario;

pub use interface::{SystemContext, TransportProtocol};
pub use packet::{NOT_IN_USE, PAYLOAD_LEN, Packet};

pub use config::{MAX_TIMEOUT_MS, ProtocolConfig, SimConfig};
pub use error::{ConfigError, SendError};
pub use scenario::{
    ProtocolConfigOverride, SimConfigOverride, TestAction, TestAssertion, TestScenario,
};
