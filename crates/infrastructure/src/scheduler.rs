//! In-process job scheduler on top of tokio.
//!
//! One pending task per job id, tracked in a dashmap. A task removes
//! itself from the table right before it starts running, so cancellation
//! only reaches jobs that have not fired yet; an in-flight job always
//! runs to completion.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tenantd_domain::{
    JobScheduler, JobTask, ReplacePolicy, Result, ScheduleOutcome, ScheduledJob,
};
use tokio::task::JoinHandle;
use tracing::debug;

struct PendingJob {
    handle: JoinHandle<()>,
}

#[derive(Clone, Default)]
pub struct TokioJobScheduler {
    jobs: Arc<DashMap<String, PendingJob>>,
}

impl TokioJobScheduler {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
        }
    }

    /// Number of jobs still waiting to fire.
    pub fn pending(&self) -> usize {
        self.jobs.len()
    }

    fn spawn(
        jobs: Arc<DashMap<String, PendingJob>>,
        job_id: String,
        run_at: chrono::DateTime<Utc>,
        task: JobTask,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let now = Utc::now();
            if run_at > now {
                if let Ok(delay) = (run_at - now).to_std() {
                    tokio::time::sleep(delay).await;
                }
            }
            // From here on the job is in flight and no longer cancellable.
            jobs.remove(&job_id);
            task.await;
        })
    }
}

#[async_trait]
impl JobScheduler for TokioJobScheduler {
    async fn schedule(&self, job: ScheduledJob) -> Result<ScheduleOutcome> {
        let ScheduledJob {
            id,
            run_at,
            replace,
            task,
        } = job;

        match self.jobs.entry(id.clone()) {
            Entry::Occupied(mut occupied) => match replace {
                ReplacePolicy::Keep => {
                    debug!(job_id = %id, "job already pending; keeping existing");
                    Ok(ScheduleOutcome::KeptExisting)
                }
                ReplacePolicy::Replace => {
                    occupied.get().handle.abort();
                    let handle = Self::spawn(Arc::clone(&self.jobs), id.clone(), run_at, task);
                    occupied.insert(PendingJob { handle });
                    debug!(job_id = %id, %run_at, "pending job replaced");
                    Ok(ScheduleOutcome::Replaced)
                }
            },
            Entry::Vacant(vacant) => {
                let handle = Self::spawn(Arc::clone(&self.jobs), id.clone(), run_at, task);
                vacant.insert(PendingJob { handle });
                debug!(job_id = %id, %run_at, "job scheduled");
                Ok(ScheduleOutcome::Scheduled)
            }
        }
    }

    async fn cancel(&self, job_id: &str) -> Result<bool> {
        if let Some((_, pending)) = self.jobs.remove(job_id) {
            pending.handle.abort();
            debug!(job_id, "pending job cancelled");
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn job_at(
        id: &str,
        in_ms: i64,
        replace: ReplacePolicy,
        counter: Arc<AtomicU32>,
    ) -> ScheduledJob {
        ScheduledJob::new(
            id.to_string(),
            Utc::now() + chrono::Duration::milliseconds(in_ms),
            replace,
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
    }

    #[tokio::test]
    async fn scheduled_job_runs_once() {
        let scheduler = TokioJobScheduler::new();
        let counter = Arc::new(AtomicU32::new(0));
        scheduler
            .schedule(job_at("job-1", 10, ReplacePolicy::Keep, Arc::clone(&counter)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn keep_policy_deduplicates_back_to_back_schedules() {
        let scheduler = TokioJobScheduler::new();
        let counter = Arc::new(AtomicU32::new(0));
        let first = scheduler
            .schedule(job_at("job-1", 30, ReplacePolicy::Keep, Arc::clone(&counter)))
            .await
            .unwrap();
        let second = scheduler
            .schedule(job_at("job-1", 30, ReplacePolicy::Keep, Arc::clone(&counter)))
            .await
            .unwrap();
        assert_eq!(first, ScheduleOutcome::Scheduled);
        assert_eq!(second, ScheduleOutcome::KeptExisting);

        tokio::time::sleep(Duration::from_millis(150)).await;
        // exactly one execution despite two schedule calls
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn replace_policy_swaps_the_pending_job() {
        let scheduler = TokioJobScheduler::new();
        let first_runs = Arc::new(AtomicU32::new(0));
        let second_runs = Arc::new(AtomicU32::new(0));
        scheduler
            .schedule(job_at("job-1", 50, ReplacePolicy::Keep, Arc::clone(&first_runs)))
            .await
            .unwrap();
        let outcome = scheduler
            .schedule(job_at("job-1", 10, ReplacePolicy::Replace, Arc::clone(&second_runs)))
            .await
            .unwrap();
        assert_eq!(outcome, ScheduleOutcome::Replaced);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(first_runs.load(Ordering::SeqCst), 0);
        assert_eq!(second_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_reaches_pending_jobs_only() {
        let scheduler = TokioJobScheduler::new();
        let counter = Arc::new(AtomicU32::new(0));
        scheduler
            .schedule(job_at("job-1", 200, ReplacePolicy::Keep, Arc::clone(&counter)))
            .await
            .unwrap();
        assert!(scheduler.cancel("job-1").await.unwrap());
        assert!(!scheduler.cancel("job-1").await.unwrap());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
