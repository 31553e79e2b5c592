// Drain pass - single-flight delivery loop

use super::Inner;
use crate::application::retry::RetryDecision;
use std::sync::Arc;
use tracing::{debug, info};

/// How a drain pass ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Queue ran empty
    #[default]
    Emptied,
    /// A delivery failed; the pass stopped to wait for the next trigger
    BackedOff,
    /// Another pass was in progress, nothing was attempted
    AlreadyRunning,
}

/// Summary of one drain pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub requeued: usize,
    pub dropped: usize,
    pub outcome: DrainOutcome,
}

impl DrainReport {
    pub(crate) fn already_running() -> Self {
        Self {
            outcome: DrainOutcome::AlreadyRunning,
            ..Self::default()
        }
    }
}

/// Ownership of the queue's draining flag
///
/// Only one guard exists per queue at a time. Dropping it (including on
/// panic inside a delivery) clears the flag.
pub(crate) struct DrainGuard {
    inner: Arc<Inner>,
    released: bool,
}

impl DrainGuard {
    /// Take the draining flag, `None` if a pass already holds it
    pub(crate) fn acquire(inner: &Arc<Inner>) -> Option<Self> {
        let acquired = inner.draining.send_if_modified(|draining| {
            if *draining {
                false
            } else {
                *draining = true;
                true
            }
        });

        acquired.then(|| Self {
            inner: Arc::clone(inner),
            released: false,
        })
    }

    fn release(&mut self) {
        if !self.released {
            self.inner.draining.send_replace(false);
            self.released = true;
        }
    }

    /// Deliver from the head until the queue is empty or a delivery fails
    pub(crate) async fn run(mut self) -> DrainReport {
        let inner = Arc::clone(&self.inner);
        let mut report = DrainReport::default();

        loop {
            let head = {
                let queue = inner.queue.lock().await;
                match queue.head() {
                    Some(op) => op.clone(),
                    None => {
                        // Released under the lock: an append either happened
                        // before this check or will find the flag cleared.
                        self.release();
                        report.outcome = DrainOutcome::Emptied;
                        return report;
                    }
                }
            };

            debug!(op_id = %head.id, retry_count = head.retry_count, "Attempting delivery");

            match inner.delivery.deliver(&head).await {
                Ok(()) => {
                    let mut queue = inner.queue.lock().await;
                    if queue.complete(&head.id).is_ok() {
                        inner.persist(&queue).await;
                        report.delivered += 1;
                        info!(
                            op_id = %head.id,
                            remaining = queue.len(),
                            "Operation delivered"
                        );
                    } else {
                        debug!(op_id = %head.id, "Delivered operation was cleared meanwhile");
                    }
                }
                Err(e) => {
                    let decision = {
                        let mut queue = inner.queue.lock().await;
                        let decision = inner.retry_policy.on_failure(&mut queue, &head.id, &e);
                        if decision.is_some() {
                            inner.persist(&queue).await;
                        }
                        decision
                    };

                    match decision {
                        Some(RetryDecision::Requeue(_)) => report.requeued += 1,
                        Some(RetryDecision::Drop(op)) => {
                            report.dropped += 1;
                            inner.permanent_failure(&op, &e);
                        }
                        None => {
                            debug!(op_id = %head.id, "Failed operation was cleared meanwhile");
                        }
                    }

                    report.outcome = DrainOutcome::BackedOff;
                    return report;
                }
            }
        }
    }
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        self.release();
    }
}
