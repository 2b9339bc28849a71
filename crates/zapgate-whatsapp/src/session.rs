//! Session lifecycle
//!
//! A [`SessionStore`] keeps one [`record`] per managed account, drives its
//! [`state`] machine from socket events and publishes [`SessionEvent`]s on an
//! event bus instead of calling hook fields.

pub mod events;
pub mod record;
pub mod state;
pub mod store;

pub use events::SessionEvent;
pub use record::SessionSnapshot;
pub use state::{SessionState, SessionStatus};
pub use store::{
    RestoreOutcome, RestoreSummary, SessionStore, StoreConfig, TeardownReport, TeardownStep,
};
