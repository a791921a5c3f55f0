//! Event type constants for task lifecycle events.
//!
//! Published on the in-process event bus by the orchestrator. The task id is
//! the source entity and the payload is the progress snapshot.

/// The orchestrator picked the task up and unit work is about to start.
pub const TASK_PROCESSING: &str = "task.processing";

/// A unit finished (successfully or not).
pub const TASK_PROGRESS: &str = "task.progress";

/// Terminal: every unit succeeded (or the job's policy collapsed to success).
pub const TASK_COMPLETED: &str = "task.completed";

/// Terminal: some units succeeded and some failed.
pub const TASK_PARTIAL: &str = "task.partial";

/// Terminal: the job failed.
pub const TASK_FAILED: &str = "task.failed";

/// Source entity type attached to task events.
pub const ENTITY_TASK: &str = "task";
