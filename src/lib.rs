pub mod broker;
pub mod channel;
pub mod config;
pub mod verification;

pub use broker::{Account, Behavior, Broker, BrokerError, BrokerResult, Hook, Transition, VariantRegistry};
pub use channel::{BrowserWindow, Channel, ChannelError, ChannelKind, InboundMessage, MemoryWindow};
pub use config::BrokerConfig;

/// Common result type for fallible setup operations
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
