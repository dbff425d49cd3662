//! Scoped Background Tasks
//!
//! Render loops, relay listeners, passive timers and the store flusher all run
//! as Tokio tasks that must not outlive their owner. [`ScopedTask`] ties a task
//! to a value: dropping the value aborts the task, and [`ScopedTask::stop`]
//! aborts and waits until the task is gone.

use tokio::task::JoinHandle;

/// Owned handle to a background task that is cancelled on drop
#[derive(Debug)]
#[must_use = "dropping a ScopedTask cancels the task"]
pub struct ScopedTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl ScopedTask {
    /// Spawn `future` on the current Tokio runtime
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F>(name: &'static str, future: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tracing::debug!(task = name, "Starting scoped task");
        Self {
            name,
            handle: Some(tokio::spawn(future)),
        }
    }

    /// Task name used in logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the task has finished (completed or cancelled)
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel the task and wait until it has stopped
    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            // A cancelled task resolves to a JoinError; either outcome means stopped
            let _ = handle.await;
            tracing::debug!(task = self.name, "Scoped task stopped");
        }
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!(task = self.name, "Scoped task aborted on drop");
        }
    }
}
