use thiserror::Error;

#[derive(Error, Debug)]
pub enum TessError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Worker initialization error: {0}")]
    WorkerInit(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Scheduler has no workers")]
    NoWorkers,

    #[error("Scheduler is closed")]
    SchedulerClosed,

    #[error("Trigger runner has stopped")]
    RunnerStopped,

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TessError {
    /// Whether the error came from setting up a worker rather than running a job.
    pub fn is_init_failure(&self) -> bool {
        matches!(self, TessError::WorkerInit(_))
    }
}

pub type Result<T> = std::result::Result<T, TessError>;
