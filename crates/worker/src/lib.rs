//! Background worker: configuration and the pending-task dispatcher.

pub mod config;
pub mod dispatcher;

pub use config::WorkerConfig;
pub use dispatcher::PendingTaskDispatcher;
