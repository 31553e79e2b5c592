// Queue Domain Model

use super::error::{DomainError, Result};
use super::operation::{FailureOutcome, OperationState, QueuedOperation};
use crate::application::constants::{DEFAULT_MAX_RETRIES, DEFAULT_STORE_KEY};
use std::collections::VecDeque;

/// Queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Store key that holds the serialized queue (owned exclusively by the queue)
    pub store_key: String,
    /// Delivery attempts per operation over its whole lifetime
    pub max_retries: u32,
}

impl QueueConfig {
    pub fn new(store_key: impl Into<String>, max_retries: u32) -> Self {
        Self {
            store_key: store_key.into(),
            max_retries,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.store_key.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "store key cannot be empty".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(DomainError::ValidationError(
                "max_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_KEY, DEFAULT_MAX_RETRIES)
    }
}

/// Ordered list of operations awaiting delivery.
///
/// Front is the next operation to attempt. Never-failed operations keep their
/// submission order; a failed operation is parked at the back, behind
/// everything queued at the time of the failure.
///
/// Mutations address operations by id, not position, so a result that comes
/// back after the list changed (e.g. a clear during delivery) cannot hit the
/// wrong entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingQueue {
    ops: VecDeque<QueuedOperation>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_operations(ops: Vec<QueuedOperation>) -> Self {
        Self { ops: ops.into() }
    }

    /// Decode the persisted snapshot (JSON array in queue order)
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let ops: Vec<QueuedOperation> = serde_json::from_str(raw)?;
        Ok(Self::from_operations(ops))
    }

    /// Encode the whole queue as the persisted snapshot
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.ops)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn push_back(&mut self, op: QueuedOperation) {
        self.ops.push_back(op);
    }

    pub fn head(&self) -> Option<&QueuedOperation> {
        self.ops.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedOperation> {
        self.ops.iter()
    }

    pub fn snapshot(&self) -> Vec<QueuedOperation> {
        self.ops.iter().cloned().collect()
    }

    pub fn count_by_state(&self, state: OperationState) -> usize {
        self.ops.iter().filter(|op| op.state() == state).count()
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.ops
            .iter()
            .position(|op| op.id == id)
            .ok_or_else(|| DomainError::OperationNotFound(id.to_string()))
    }

    /// Remove a delivered operation
    pub fn complete(&mut self, id: &str) -> Result<QueuedOperation> {
        let idx = self.position(id)?;
        self.ops
            .remove(idx)
            .ok_or_else(|| DomainError::OperationNotFound(id.to_string()))
    }

    /// Record a failed attempt: park at the back, or remove once the budget is spent.
    ///
    /// Returns the outcome and a copy of the operation after the increment.
    pub fn record_failure(
        &mut self,
        id: &str,
        max_retries: u32,
    ) -> Result<(FailureOutcome, QueuedOperation)> {
        let idx = self.position(id)?;
        let mut op = self
            .ops
            .remove(idx)
            .ok_or_else(|| DomainError::OperationNotFound(id.to_string()))?;

        let outcome = op.record_failure(max_retries);
        if outcome == FailureOutcome::Parked {
            self.ops.push_back(op.clone());
        }
        Ok((outcome, op))
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OperationPayload;
    use serde_json::json;

    fn op(id: &str) -> QueuedOperation {
        QueuedOperation::new(id, 0, OperationPayload::new(json!({ "id": id })))
    }

    fn ids(queue: &PendingQueue) -> Vec<String> {
        queue.iter().map(|op| op.id.clone()).collect()
    }

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.store_key, "offline_queue");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_zero_retries_and_blank_key() {
        assert!(QueueConfig::new("k", 0).validate().is_err());
        assert!(QueueConfig::new("  ", 3).validate().is_err());
    }

    #[test]
    fn test_failure_parks_behind_existing_operations() {
        let mut queue = PendingQueue::from_operations(vec![op("a"), op("b"), op("c")]);

        let (outcome, parked) = queue.record_failure("a", 3).unwrap();
        assert_eq!(outcome, FailureOutcome::Parked);
        assert_eq!(parked.retry_count, 1);
        assert_eq!(ids(&queue), vec!["b", "c", "a"]);
        assert_eq!(queue.count_by_state(OperationState::Parked), 1);
        assert_eq!(queue.count_by_state(OperationState::Pending), 2);
    }

    #[test]
    fn test_exhausted_operation_is_removed() {
        let mut queue = PendingQueue::from_operations(vec![op("a"), op("b")]);
        queue.record_failure("a", 2).unwrap();
        let (outcome, dropped) = queue.record_failure("a", 2).unwrap();

        assert_eq!(outcome, FailureOutcome::Exhausted);
        assert_eq!(dropped.retry_count, 2);
        assert_eq!(ids(&queue), vec!["b"]);
    }

    #[test]
    fn test_complete_unknown_id_is_error() {
        let mut queue = PendingQueue::from_operations(vec![op("a")]);
        assert!(matches!(
            queue.complete("zzz"),
            Err(DomainError::OperationNotFound(_))
        ));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_json_snapshot_preserves_order_and_retries() {
        let mut queue = PendingQueue::from_operations(vec![op("a"), op("b"), op("c")]);
        queue.record_failure("a", 3).unwrap();

        let raw = queue.to_json().unwrap();
        let restored = PendingQueue::from_json(&raw).unwrap();

        assert_eq!(restored, queue);
        assert_eq!(ids(&restored), vec!["b", "c", "a"]);
        assert_eq!(restored.snapshot()[2].retry_count, 1);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(PendingQueue::from_json("{not json").is_err());
        assert!(PendingQueue::from_json(r#"{"id":"a"}"#).is_err());
    }
}
