//! Cancellable delayed tasks on the tokio runtime.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Runs `task` after `delay` unless cancelled first. Dropping the handle cancels it.
#[derive(Debug)]
#[must_use = "dropping a DelayedTask cancels it"]
pub struct DelayedTask {
    handle: Option<JoinHandle<()>>,
}

impl DelayedTask {
    pub fn spawn<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn cancel(mut self) {
        if let Some(h) = self.handle.take() {
            h.abort();
        }
    }

    /// Release the handle without cancelling; used by the task itself once it has fired.
    pub fn disarm(mut self) {
        self.handle.take();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(JoinHandle::is_finished).unwrap_or(true)
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        if let Some(h) = self.handle.take() {
            h.abort();
        }
    }
}
