use std::sync::Arc;

use image::DynamicImage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{Result, TessError};
use crate::trigger::Trigger;

/// Counters reported when a runner shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerStats {
    pub succeeded: usize,
    pub failed: usize,
}

/// Drives a trigger from a background task.
///
/// Images are queued with `send` and processed one at a time in arrival
/// order. Failures are logged and counted; they never reach the sender.
pub struct TriggerRunner {
    sender: mpsc::Sender<DynamicImage>,
    cancel: CancellationToken,
    handle: JoinHandle<RunnerStats>,
}

impl TriggerRunner {
    /// Spawn the runner task. `capacity` bounds the number of pending images.
    pub fn spawn(trigger: Arc<dyn Trigger>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_trigger_loop(trigger, receiver, cancel.child_token()));

        Self {
            sender,
            cancel,
            handle,
        }
    }

    /// Queue an image, waiting for room when the queue is full.
    pub async fn send(&self, image: DynamicImage) -> Result<()> {
        self.sender
            .send(image)
            .await
            .map_err(|_| TessError::RunnerStopped)
    }

    /// Process everything already queued, then stop.
    pub async fn finish(self) -> Result<RunnerStats> {
        let TriggerRunner { sender, handle, .. } = self;
        drop(sender);
        handle
            .await
            .map_err(|e| TessError::Task(format!("trigger runner panicked: {e}")))
    }

    /// Stop after the image currently being processed; queued images are dropped.
    pub async fn stop(self) -> Result<RunnerStats> {
        self.cancel.cancel();
        self.finish().await
    }
}

async fn run_trigger_loop(
    trigger: Arc<dyn Trigger>,
    mut receiver: mpsc::Receiver<DynamicImage>,
    cancel: CancellationToken,
) -> RunnerStats {
    let mut stats = RunnerStats::default();

    loop {
        let image = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            image = receiver.recv() => match image {
                Some(image) => image,
                None => break,
            },
        };

        match trigger.run(image).await {
            Ok(()) => stats.succeeded += 1,
            Err(e) => {
                stats.failed += 1;
                error!(error = %e, "Trigger run failed");
            }
        }
        debug!(succeeded = stats.succeeded, failed = stats.failed, "Trigger run finished");
    }

    info!(
        succeeded = stats.succeeded,
        failed = stats.failed,
        "Trigger runner stopped"
    );
    stats
}
