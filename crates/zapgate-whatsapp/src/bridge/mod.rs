//! WhatsApp - Baileys bridge socket

/// Bridge connection configuration.
pub mod config;
/// Socket factory and socket over the bridge HTTP API.
pub mod socket;
/// Bridge API request/response and webhook event types.
pub mod types;

pub use config::BridgeConfig;
pub use socket::{BridgeSocket, BridgeSocketFactory};
pub use types::{BridgeConnection, BridgeEvent};
