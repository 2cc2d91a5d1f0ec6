//! Print Queue Manager
//!
//! One FIFO queue per printer name, created lazily on first submission.
//! Submission only records the job and schedules a drain task, so callers get
//! a job ID back without waiting for the printer. A drain owns its printer
//! until the queue is empty: it runs one job at a time, records the outcome,
//! clears the `processing` flag and moves on, whether or not the job failed.
//! Different printers drain fully independently.

use print_common::{Job, QueueStatus};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Future produced by a job's work function
pub type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'static>>;

type Work = Box<dyn FnOnce() -> JobFuture + Send + 'static>;

struct PendingJob {
    id: String,
    work: Work,
}

#[derive(Default)]
struct PrinterQueue {
    pending: VecDeque<PendingJob>,
    /// At most one job per printer is in flight
    processing: bool,
}

#[derive(Default)]
struct Registry {
    jobs: HashMap<String, Job>,
    queues: HashMap<String, PrinterQueue>,
}

/// Scheduling core shared by all request handlers
#[derive(Clone)]
pub struct QueueManager {
    registry: Arc<Mutex<Registry>>,
    retention: Duration,
}

impl QueueManager {
    /// Create a manager that keeps finished jobs for `retention`
    pub fn new(retention: Duration) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            retention,
        }
    }

    /// Queue `work` on `printer_name` and return its job ID.
    ///
    /// The work function is not polled before this returns.
    pub async fn submit<F, Fut>(&self, printer_name: &str, metadata: Value, work: F) -> String
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let id = Uuid::new_v4().to_string();
        let job = Job::new(id.clone(), printer_name.to_string(), metadata);

        {
            let mut registry = self.registry.lock().await;
            registry.jobs.insert(id.clone(), job);
            registry
                .queues
                .entry(printer_name.to_string())
                .or_default()
                .pending
                .push_back(PendingJob {
                    id: id.clone(),
                    work: Box::new(move || Box::pin(work()) as JobFuture),
                });
        }

        info!("Queued print job {} on {}", id, printer_name);

        self.schedule_drain(printer_name.to_string());
        id
    }

    /// Current record of a job, if it is still retained
    pub async fn get_job_status(&self, job_id: &str) -> Option<Job> {
        self.registry.lock().await.jobs.get(job_id).cloned()
    }

    /// Depth and busy flag of one printer queue
    pub async fn queue_status(&self, printer_name: &str) -> QueueStatus {
        let registry = self.registry.lock().await;
        match registry.queues.get(printer_name) {
            Some(queue) => QueueStatus::new(
                printer_name.to_string(),
                queue.pending.len(),
                queue.processing,
            ),
            None => QueueStatus::new(printer_name.to_string(), 0, false),
        }
    }

    /// Status of every queue seen so far, ordered by printer name
    pub async fn all_queue_statuses(&self) -> Vec<QueueStatus> {
        let registry = self.registry.lock().await;
        let mut statuses: Vec<QueueStatus> = registry
            .queues
            .iter()
            .map(|(name, queue)| QueueStatus::new(name.clone(), queue.pending.len(), queue.processing))
            .collect();
        statuses.sort_by(|a, b| a.printer_name.cmp(&b.printer_name));
        statuses
    }

    /// Drop finished jobs older than the retention window.
    ///
    /// Returns the number of jobs removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = chrono::Utc::now();
        let retention = self.retention;
        let mut registry = self.registry.lock().await;
        let before = registry.jobs.len();

        registry.jobs.retain(|_, job| {
            if !job.status.is_terminal() {
                return true;
            }
            match job.completed_at {
                Some(completed_at) => (now - completed_at)
                    .to_std()
                    .map(|age| age < retention)
                    .unwrap_or(true),
                None => true,
            }
        });

        let removed = before - registry.jobs.len();
        if removed > 0 {
            debug!("Swept {} expired print jobs", removed);
        }
        removed
    }

    /// Run [`QueueManager::sweep_expired`] every `interval`
    pub fn spawn_retention_sweep(&self, interval: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                manager.sweep_expired().await;
            }
        })
    }

    fn schedule_drain(&self, printer_name: String) {
        let manager = self.clone();
        tokio::spawn(async move {
            manager.drain(printer_name).await;
        });
    }

    async fn drain(&self, printer_name: String) {
        loop {
            let PendingJob { id, work } = {
                let mut registry = self.registry.lock().await;
                let Registry { jobs, queues } = &mut *registry;

                let Some(queue) = queues.get_mut(&printer_name) else {
                    return;
                };
                // The drain that owns the in-flight job picks up the rest
                if queue.processing {
                    return;
                }
                let Some(next) = queue.pending.pop_front() else {
                    return;
                };

                queue.processing = true;
                if let Some(job) = jobs.get_mut(&next.id) {
                    job.mark_processing();
                }
                next
            };

            debug!("Processing print job {} on {}", id, printer_name);

            // Run in its own task so a panicking job is reported, not propagated
            let outcome = tokio::spawn(async move { work().await }).await;

            let mut registry = self.registry.lock().await;
            if let Some(job) = registry.jobs.get_mut(&id) {
                match outcome {
                    Ok(Ok(result)) => {
                        info!("Print job {} completed on {}", id, printer_name);
                        job.mark_completed(result);
                    }
                    Ok(Err(e)) => {
                        error!("Print job {} failed on {}: {:#}", id, printer_name, e);
                        job.mark_failed(format!("{:#}", e));
                    }
                    Err(e) => {
                        error!("Print job {} aborted on {}: {}", id, printer_name, e);
                        job.mark_failed(format!("job aborted: {}", e));
                    }
                }
            }
            if let Some(queue) = registry.queues.get_mut(&printer_name) {
                queue.processing = false;
            }
        }
    }
}
