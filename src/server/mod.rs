//! Server module for Zapgate
//!
//! Contains the main server initialization and runtime logic.
//!
//! # Module Structure
//!
//! - `config`: Configuration structures for all server components
//! - `loader`: Configuration loading from files and environment
//! - `validation`: Production configuration validation
//! - `background_tasks`: Notification forwarder, metrics reporter, startup restore
//! - `init`: Main server initialization and run loop

mod background_tasks;
pub mod config;
mod init;
mod loader;
mod validation;

// Re-export public API
pub use init::run;
pub use loader::load_config;
