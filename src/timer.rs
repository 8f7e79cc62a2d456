//! Cancellable single-shot scheduled tasks.
//!
//! A `ScheduledTask` aborts its tokio task when cancelled or dropped, so an
//! owner that is torn down or restarted never sees a stale callback run.

use std::{future::Future, time::Duration};

use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct ScheduledTask {
  handle: JoinHandle<()>,
}

impl ScheduledTask {
  /// Run `fut` once after `delay`. Must be called inside a tokio runtime.
  pub fn after<F>(delay: Duration, fut: F) -> Self
  where
    F: Future<Output = ()> + Send + 'static,
  {
    let handle = tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      fut.await;
    });
    Self { handle }
  }

  pub fn cancel(self) {
    drop(self);
  }

  pub fn is_finished(&self) -> bool {
    self.handle.is_finished()
  }
}

impl Drop for ScheduledTask {
  fn drop(&mut self) {
    self.handle.abort();
  }
}
