use crate::background::pipeline::{PipelineError, PipelineResult, PipelineRunner};
use anyhow::{Context, Result};
use dashmap::DashMap;
use log::{error, info};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Lifecycle of one submission inside the registry.
#[derive(Debug)]
enum TaskSlot {
    Queued,
    Running,
    Finished(PipelineResult),
}

/// What a status poll observed.
#[derive(Debug)]
pub enum PollOutcome {
    /// The task is queued or running.
    Processing,
    /// The task finished; the result is handed to exactly one poller.
    Finished(PipelineResult),
    /// Never submitted, or already consumed by an earlier poll.
    Unknown,
}

/// Tracks every submission from acceptance to result pickup and drives the
/// pipeline on a bounded worker pool. Submissions beyond the pool size wait
/// in the pool's queue.
pub struct TaskRegistry {
    tasks: Arc<DashMap<Uuid, TaskSlot>>,
    runner: Arc<dyn PipelineRunner>,
    pool: ThreadPool,
}

impl TaskRegistry {
    pub fn new(runner: Arc<dyn PipelineRunner>, worker_count: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_count.max(1))
            .thread_name(|i| format!("pipeline-worker-{}", i))
            .build()
            .context("failed to build the pipeline worker pool")?;
        Ok(Self {
            tasks: Arc::new(DashMap::new()),
            runner,
            pool,
        })
    }

    /// Register a new submission and hand it to the worker pool. Returns
    /// immediately with the task id.
    pub fn submit(&self, url: String) -> Uuid {
        let task_id = Uuid::new_v4();
        self.tasks.insert(task_id, TaskSlot::Queued);

        let tasks = Arc::clone(&self.tasks);
        let runner = Arc::clone(&self.runner);
        self.pool.spawn(move || {
            tasks.insert(task_id, TaskSlot::Running);
            let start_time = Instant::now();

            // The worker must always publish a result; an escaped panic
            // would otherwise abort the process and leave the slot stuck
            // at Running forever.
            let result = catch_unwind(AssertUnwindSafe(|| runner.run(task_id, &url)))
                .unwrap_or_else(|panic| Err(PipelineError::Unexpected(panic_message(panic))));

            let duration = format!("{:?}", start_time.elapsed());
            match &result {
                Ok(report) => {
                    info!(duration = &*duration; "Task {} completed: {:?}", task_id, report.accent)
                }
                Err(err) => {
                    error!(duration = &*duration; "Task {} failed at {} stage: {}", task_id, err.stage(), err)
                }
            }

            tasks.insert(task_id, TaskSlot::Finished(result));
        });

        info!("Task {} accepted", task_id);
        task_id
    }

    /// Look up a task. A finished result is removed as it is returned, so
    /// only the first poll after completion observes it; concurrent polls
    /// race through the atomic removal and exactly one wins.
    pub fn poll(&self, task_id: Uuid) -> PollOutcome {
        if let Some((_, TaskSlot::Finished(result))) = self
            .tasks
            .remove_if(&task_id, |_, slot| matches!(slot, TaskSlot::Finished(_)))
        {
            return PollOutcome::Finished(result);
        }
        if self.tasks.contains_key(&task_id) {
            PollOutcome::Processing
        } else {
            PollOutcome::Unknown
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
