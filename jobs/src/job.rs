//! The unit of work handed to the worker pool.

use crate::errors::JobError;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(90);

/// Dispatch order: Critical drains before High before Normal before Low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    /// Queue slot, scanned in ascending order on dequeue.
    pub(crate) const fn slot(&self) -> usize {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Retrying,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Implementations do the actual work for one job type.
#[async_trait::async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(&self, job: &Job) -> Result<Value, JobError>;
}

pub type JobCallback = Box<dyn FnOnce(&Job) + Send + Sync>;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

pub struct Job {
    pub id: String,
    pub job_type: String,
    pub priority: Priority,
    pub payload: Value,
    pub status: JobStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: SystemTime,
    pub started_at: Option<SystemTime>,
    pub completed_at: Option<SystemTime>,
    pub timeout: Duration,
    pub error: Option<String>,
    pub result: Option<Value>,
    pub(crate) on_complete: Option<JobCallback>,
    pub(crate) on_error: Option<JobCallback>,
}

impl Job {
    pub fn new(job_type: impl Into<String>, payload: Value) -> Self {
        Job {
            id: format!("job-{}", NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed)),
            job_type: job_type.into(),
            priority: Priority::Normal,
            payload,
            status: JobStatus::Pending,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            created_at: SystemTime::now(),
            started_at: None,
            completed_at: None,
            timeout: DEFAULT_JOB_TIMEOUT,
            error: None,
            result: None,
            on_complete: None,
            on_error: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Invoked once the job reaches Completed.
    pub fn on_complete(mut self, callback: impl FnOnce(&Job) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Invoked once the job reaches Failed or Cancelled.
    pub fn on_error(mut self, callback: impl FnOnce(&Job) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("job_type", &self.job_type)
            .field("priority", &self.priority)
            .field("status", &self.status)
            .field("retry_count", &self.retry_count)
            .finish_non_exhaustive()
    }
}

/// Terminal snapshot of a job, as delivered by `submit_and_wait`.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub id: String,
    pub status: JobStatus,
    pub error: Option<String>,
    pub result: Option<Value>,
}

impl From<&Job> for JobResult {
    fn from(job: &Job) -> Self {
        JobResult {
            id: job.id.clone(),
            status: job.status,
            error: job.error.clone(),
            result: job.result.clone(),
        }
    }
}
