use std::time::Duration;

/// Terminal reasons a job stops executing.
#[derive(thiserror::Error, Debug)]
pub enum JobError {
    #[error("no handler registered for job type {0:?}")]
    NoHandler(String),
    #[error("job timed out after {0:?}")]
    Timeout(Duration),
    #[error("job cancelled")]
    Cancelled,
    #[error("{0}")]
    Handler(String),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,
    #[error("queue is full")]
    Full,
    #[error("pop cancelled")]
    Cancelled,
}

/// Rejections surfaced to submitters.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SubmitError {
    #[error("worker pool is stopped")]
    Stopped,
    #[error("job queue is full")]
    QueueFull,
    #[error("circuit breaker is open")]
    CircuitOpen,
    #[error("timed out waiting for job completion")]
    WaitTimeout,
}
