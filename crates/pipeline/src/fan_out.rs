//! Bounded-concurrency fan-out over independent units.
//!
//! Each unit runs on its own task behind a shared semaphore. Completions are
//! handled in arrival order: every one is counted and persisted through the
//! task's [`ProgressReporter`] before the next is taken. A failing or
//! panicking unit is recorded and never aborts its siblings. There are no
//! retries and no timeouts.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use slidesmith_core::progress::{ArtifactRef, UnitFailure};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::PipelineError;
use crate::progress::ProgressReporter;

/// One unit of work: a display label plus whatever the worker needs to
/// re-load its entity (normally just ids).
#[derive(Debug, Clone)]
pub struct FanOutUnit<U> {
    pub label: String,
    pub input: U,
}

impl<U> FanOutUnit<U> {
    pub fn new(label: impl Into<String>, input: U) -> Self {
        Self {
            label: label.into(),
            input,
        }
    }
}

/// What a successful unit hands back.
#[derive(Debug, Clone)]
pub struct UnitSuccess<R> {
    pub value: R,
    /// Recorded in the progress detail when present.
    pub artifact: Option<ArtifactRef>,
}

impl<R> UnitSuccess<R> {
    pub fn new(value: R) -> Self {
        Self {
            value,
            artifact: None,
        }
    }

    pub fn with_artifact(mut self, artifact: ArtifactRef) -> Self {
        self.artifact = Some(artifact);
        self
    }
}

/// Fan-in result.
#[derive(Debug)]
pub struct FanOutSummary<R> {
    pub completed: u32,
    pub failed: u32,
    /// Successful values keyed by unit index, in index order.
    pub results: Vec<(usize, R)>,
}

/// Run `generate_one` over every unit with at most `workers` in flight.
///
/// The caller is expected to have called [`ProgressReporter::begin`] with
/// `units.len()` as the total.
pub async fn run<U, R, F, Fut>(
    units: Vec<FanOutUnit<U>>,
    workers: usize,
    reporter: &ProgressReporter,
    generate_one: F,
) -> FanOutSummary<R>
where
    U: Send + 'static,
    R: Send + 'static,
    F: Fn(usize, U) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<UnitSuccess<R>, PipelineError>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let generate_one = Arc::new(generate_one);
    let mut set = JoinSet::new();

    tracing::debug!(
        task_id = reporter.task_id(),
        units = units.len(),
        workers,
        "Starting fan-out"
    );

    for (index, unit) in units.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let generate_one = Arc::clone(&generate_one);
        let FanOutUnit { label, input } = unit;

        set.spawn(async move {
            let outcome = AssertUnwindSafe(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return Err(PipelineError::Internal("worker pool closed".to_string()));
                };
                generate_one(index, input).await
            })
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(PipelineError::Internal(format!(
                    "unit panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });
            (index, label, outcome)
        });
    }

    let mut summary = FanOutSummary {
        completed: 0,
        failed: 0,
        results: Vec::new(),
    };

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, _label, Ok(success))) => {
                summary.completed += 1;
                reporter.record_success(success.artifact).await;
                summary.results.push((index, success.value));
            }
            Ok((_index, label, Err(e))) => {
                summary.failed += 1;
                reporter
                    .record_failure(UnitFailure {
                        unit: label,
                        error: e.to_string(),
                    })
                    .await;
            }
            Err(e) => {
                // Only reachable if the runtime cancels the task.
                summary.failed += 1;
                reporter
                    .record_failure(UnitFailure {
                        unit: "unknown".to_string(),
                        error: e.to_string(),
                    })
                    .await;
            }
        }
    }

    summary.results.sort_by_key(|(index, _)| *index);
    tracing::debug!(
        task_id = reporter.task_id(),
        completed = summary.completed,
        failed = summary.failed,
        "Fan-out finished"
    );
    summary
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use slidesmith_core::job::JobKind;
    use slidesmith_core::progress::ProgressDetail;
    use slidesmith_db::models::task::CreateTask;
    use slidesmith_db::{GenerationStore, MemoryStore};
    use slidesmith_events::EventBus;

    async fn reporter(total: u32) -> ProgressReporter {
        let store = Arc::new(MemoryStore::new());
        let task = store
            .create_task(&CreateTask {
                project_id: None,
                job_kind: JobKind::GenerateImages,
                parameters: serde_json::json!({}),
            })
            .await
            .unwrap();
        store.mark_task_processing(task.id).await.unwrap();
        let reporter = ProgressReporter::new(
            task.id,
            None,
            JobKind::GenerateImages,
            store,
            Arc::new(EventBus::default()),
        );
        reporter
            .begin(total, ProgressDetail::for_kind(JobKind::GenerateImages, None))
            .await
            .unwrap();
        reporter
    }

    fn units(n: usize) -> Vec<FanOutUnit<usize>> {
        (0..n).map(|i| FanOutUnit::new(format!("unit {i}"), i)).collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_never_exceeds_worker_limit() {
        let reporter = reporter(10).await;
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let summary = {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            run(units(10), 3, &reporter, move |_, i| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(UnitSuccess::new(i * 2))
                }
            })
            .await
        };

        assert_eq!(summary.completed, 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        let values: Vec<usize> = summary.results.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, (0..10).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn failure_does_not_abort_siblings() {
        let reporter = reporter(4).await;
        let summary = run(units(4), 2, &reporter, |_, i| async move {
            if i == 1 {
                Err(PipelineError::precondition("No description content for page"))
            } else {
                Ok(UnitSuccess::new(i))
            }
        })
        .await;

        assert_eq!((summary.completed, summary.failed), (3, 1));
        let progress = reporter.snapshot().await;
        assert_eq!((progress.completed, progress.failed), (3, 1));
        let failures = progress.detail.as_ref().unwrap().failures();
        assert_eq!(failures[0].unit, "unit 1");
        assert_eq!(failures[0].error, "No description content for page");
    }

    #[tokio::test]
    async fn panicking_unit_counts_as_failed() {
        let reporter = reporter(3).await;
        let summary = run(units(3), 3, &reporter, |_, i| async move {
            if i == 2 {
                panic!("provider adapter bug");
            }
            Ok(UnitSuccess::new(i))
        })
        .await;

        assert_eq!((summary.completed, summary.failed), (2, 1));
        let progress = reporter.snapshot().await;
        let failures = progress.detail.as_ref().unwrap().failures();
        assert!(failures[0].error.contains("provider adapter bug"));
    }
}
