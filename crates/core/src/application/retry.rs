// Retry logic
use crate::domain::{FailureOutcome, PendingQueue, QueuedOperation};
use crate::port::DeliveryError;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq)]
pub enum RetryDecision {
    /// Parked at the tail, will be attempted again on a later drain pass
    Requeue(QueuedOperation),
    /// Budget spent, operation removed from the queue for good
    Drop(QueuedOperation),
}

/// Bounded retry policy
///
/// Attempts are counted over the operation's lifetime, not per drain pass.
/// There is no backoff timer: a failure ends the pass and the next trigger
/// (new submission or connectivity regained) tries again.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Apply a failed attempt for `id` to the queue
    ///
    /// Returns `None` when the operation is no longer queued (cleared while
    /// its delivery was in flight).
    pub fn on_failure(
        &self,
        queue: &mut PendingQueue,
        id: &str,
        error: &DeliveryError,
    ) -> Option<RetryDecision> {
        let (outcome, op) = queue.record_failure(id, self.max_retries).ok()?;

        match outcome {
            FailureOutcome::Parked => {
                info!(
                    op_id = %op.id,
                    retry_count = op.retry_count,
                    max_retries = self.max_retries,
                    error = %error,
                    "Delivery failed, operation parked at tail"
                );
                Some(RetryDecision::Requeue(op))
            }
            FailureOutcome::Exhausted => {
                warn!(
                    op_id = %op.id,
                    retry_count = op.retry_count,
                    max_retries = self.max_retries,
                    error = %error,
                    "Max retry attempts reached, dropping operation"
                );
                Some(RetryDecision::Drop(op))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OperationPayload;

    fn queue_of(ids: &[&str]) -> PendingQueue {
        PendingQueue::from_operations(
            ids.iter()
                .map(|id| QueuedOperation::new(*id, 0, OperationPayload::new(serde_json::json!(id))))
                .collect(),
        )
    }

    fn err() -> DeliveryError {
        DeliveryError::Transport("offline".to_string())
    }

    #[test]
    fn test_requeue_then_drop() {
        let policy = RetryPolicy::new(2);
        let mut queue = queue_of(&["a", "b"]);

        match policy.on_failure(&mut queue, "a", &err()) {
            Some(RetryDecision::Requeue(op)) => assert_eq!(op.retry_count, 1),
            other => panic!("expected requeue, got {:?}", other),
        }
        assert_eq!(queue.head().unwrap().id, "b");

        match policy.on_failure(&mut queue, "a", &err()) {
            Some(RetryDecision::Drop(op)) => assert_eq!(op.id, "a"),
            other => panic!("expected drop, got {:?}", other),
        }
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_failure_for_cleared_operation_is_ignored() {
        let policy = RetryPolicy::new(3);
        let mut queue = PendingQueue::new();
        assert_eq!(policy.on_failure(&mut queue, "gone", &err()), None);
    }
}
