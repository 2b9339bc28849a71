//! Zapgate WhatsApp
//!
//! Session lifecycle and message normalization:
//! - `session`: session store, record state machine and lifecycle events
//! - `filter` / `classifier`: inbound message filtering and media classification
//! - `socket`: the messaging-network collaborator traits
//! - `bridge`: socket implementation over a Baileys Node.js bridge
//! - `auth`: persisted credential folders

#![forbid(unsafe_code)]

pub mod auth;
pub mod bridge;
pub mod classifier;
pub mod filter;
pub mod jid;
pub mod message;
pub mod raw;
pub mod session;
pub mod socket;

pub use bridge::{BridgeConfig, BridgeEvent, BridgeSocketFactory};
pub use classifier::{classify, Classified, DownloadInfo, MediaInfo, MessageType};
pub use filter::{is_processable, rejection_reason, FilterReason};
pub use jid::AccountType;
pub use message::{NormalizedMessage, Party};
pub use raw::RawMessage;
pub use session::{
    RestoreOutcome, RestoreSummary, SessionEvent, SessionSnapshot, SessionStatus, SessionStore,
    StoreConfig, TeardownReport, TeardownStep,
};
pub use socket::{SentMessage, SocketFactory, WaSocket};
