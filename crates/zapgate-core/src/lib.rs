//! Zapgate Core
//!
//! Shared primitives for the WhatsApp session orchestrator:
//! - Error: the session/pipeline error taxonomy
//! - EventBus: broadcast fan-out of session lifecycle events
//! - Retry: exponential backoff for outbound delivery
//! - Metrics: hourly message counter and process report
//! - Shutdown: cancellation for background tasks

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod event_bus;
pub mod metrics;
pub mod retry;
pub mod shutdown;

pub use error::{Error, Result};
pub use event_bus::EventBus;
pub use metrics::{MemoryUsage, MetricsCollector, MetricsReport};
pub use retry::{retry_with_backoff, RetryConfig, RetryError};
pub use shutdown::{shutdown_signal_with_controller, wait_for_shutdown_signal, ShutdownController};
