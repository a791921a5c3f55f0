//! In-process task event bus.
//!
//! - [`EventBus`]: publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`TaskEvent`]: lifecycle event of a background task.
//! - [`EventLogger`]: background subscriber that writes every event to the
//!   tracing log.

pub mod bus;
pub mod logger;

pub use bus::{EventBus, TaskEvent};
pub use logger::EventLogger;
