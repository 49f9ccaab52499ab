//! Supervisor for fire-and-forget handler work.
//!
//! Deferred work runs as tokio tasks tracked by a `TaskTracker`. Failures and
//! panics are logged and counted here; nothing is reported back to whoever
//! spawned the task.

use crate::handler::DeferredWork;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

#[derive(Clone, Default)]
pub struct TaskSupervisor {
    tracker: TaskTracker,
    spawned: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `work` on the current tokio runtime. Returns false (and drops the
    /// work) when called outside a runtime.
    pub fn spawn(&self, label: impl Into<String>, work: DeferredWork) -> bool {
        let label = label.into();
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(_) => {
                warn!("No tokio runtime, dropping deferred work {}", label);
                return false;
            }
        };

        self.spawned.fetch_add(1, Ordering::Relaxed);
        let failed = self.failed.clone();
        self.tracker.spawn_on(
            async move {
                match AssertUnwindSafe(work).catch_unwind().await {
                    Ok(Ok(())) => debug!("Deferred work {} finished", label),
                    Ok(Err(e)) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        warn!("Deferred work {} failed: {:#}", label, e);
                    }
                    Err(panic) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        error!("Deferred work {} panicked: {}", label, panic_message(panic.as_ref()));
                    }
                }
            },
            &handle,
        );
        true
    }

    /// Wait for every task spawned so far. The supervisor stays usable.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Final teardown: wait for in-flight work.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        debug!(
            "Supervisor shut down ({} spawned, {} failed)",
            self.spawned(),
            self.failed()
        );
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
