//! Zapgate Notifier
//!
//! Reports session status, messages, QR codes, first connections and
//! process metrics to the external system of record over HTTP.

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod payload;

pub use client::BackendNotifier;
pub use config::{Environment, NotifierConfig};
pub use error::{NotifierError, Result};
