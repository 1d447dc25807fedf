//! JobScheduler port for deferred background work.
//!
//! The orchestrator and the health monitor only depend on this
//! capability: run a boxed task at a given time, keyed by a deterministic
//! job id, with at most one pending job per id. Delivery guarantees of
//! the underlying runner are out of scope.

use crate::shared_kernel::{RequestId, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;

/// Boxed unit of background work.
pub type JobTask = BoxFuture<'static, ()>;

/// What to do when a job with the same id is already pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacePolicy {
    /// Leave the existing pending job untouched; the new one is dropped.
    Keep,
    /// Cancel the existing pending job and schedule the new one.
    Replace,
}

/// Result of a schedule call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled,
    KeptExisting,
    Replaced,
}

/// One deferred job keyed by a deterministic identifier.
pub struct ScheduledJob {
    pub id: String,
    pub run_at: DateTime<Utc>,
    pub replace: ReplacePolicy,
    pub task: JobTask,
}

impl ScheduledJob {
    pub fn new(
        id: String,
        run_at: DateTime<Utc>,
        replace: ReplacePolicy,
        task: impl Future<Output = ()> + Send + 'static,
    ) -> Self {
        Self {
            id,
            run_at,
            replace,
            task: Box::pin(task),
        }
    }
}

impl fmt::Debug for ScheduledJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("id", &self.id)
            .field("run_at", &self.run_at)
            .field("replace", &self.replace)
            .finish()
    }
}

/// Scheduling capability injected into the application layer.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Schedule `job` to run at `job.run_at`. With an already-pending id
    /// the outcome follows `job.replace`.
    async fn schedule(&self, job: ScheduledJob) -> Result<ScheduleOutcome>;

    /// Cancel a pending job. Returns false when nothing was pending
    /// (unknown id, or the job already started).
    async fn cancel(&self, job_id: &str) -> Result<bool>;
}

/// Job id for the main orchestrator run of a request.
pub fn provision_job_id(request_id: &RequestId) -> String {
    format!("provision-{request_id}")
}

/// Job id for the backend health poll of a request.
pub fn health_job_id(request_id: &RequestId) -> String {
    format!("backend-health-{request_id}")
}
