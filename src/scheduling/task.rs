use tokio::{task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

/// A spawned background loop together with the token that stops it.
pub struct ScheduledTask {
    task_handle: JoinHandle<()>,
    cancellation_token: CancellationToken,
}

impl ScheduledTask {
    pub fn new(task_handle: JoinHandle<()>, cancellation_token: CancellationToken) -> Self {
        Self {
            task_handle,
            cancellation_token,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task_handle.is_finished()
    }

    /// Signals the loop to stop and waits up to `timeout` for it to wind down.
    pub async fn cancel(self, timeout: std::time::Duration) {
        self.cancellation_token.cancel();
        match time::timeout(timeout, self.task_handle).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => log::error!("Background task failed. [error = {}]", error),
            Err(_) => log::warn!("Background task did not stop in time. [timeout = {:?}]", timeout),
        }
    }
}
