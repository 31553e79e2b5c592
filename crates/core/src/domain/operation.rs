// Queued Operation Domain Model

use serde::{Deserialize, Serialize};

/// Operation ID (assigned at submission by an IdProvider)
pub type OperationId = String;

/// Opaque payload the caller wants delivered (JSON serializable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationPayload(serde_json::Value);

impl OperationPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for OperationPayload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Where an operation sits while it is still queued.
///
/// Delivered and dropped operations leave the queue, so they have no state here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// Never attempted, or never failed
    Pending,
    /// Failed at least once and was moved to the tail
    Parked,
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationState::Pending => write!(f, "PENDING"),
            OperationState::Parked => write!(f, "PARKED"),
        }
    }
}

/// Outcome of recording a failed delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Budget left: operation stays queued (parked at the tail)
    Parked,
    /// Budget spent: operation must be removed
    Exhausted,
}

/// A single unit of work submitted for eventual delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub id: OperationId,
    pub payload: OperationPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub submitted_at: i64, // epoch ms
    #[serde(default)]
    pub retry_count: u32,
}

impl QueuedOperation {
    /// Create a new operation
    ///
    /// # Arguments
    ///
    /// * `id` - Unique operation ID (injected, not generated)
    /// * `submitted_at` - Submission timestamp in epoch ms (injected, not system time)
    /// * `payload` - What to deliver
    pub fn new(id: impl Into<String>, submitted_at: i64, payload: OperationPayload) -> Self {
        Self {
            id: id.into(),
            payload,
            correlation_id: None,
            submitted_at,
            retry_count: 0,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn state(&self) -> OperationState {
        if self.retry_count == 0 {
            OperationState::Pending
        } else {
            OperationState::Parked
        }
    }

    /// Record one failed delivery attempt.
    ///
    /// The counter never goes past `max_retries`: the attempt that reaches the
    /// limit reports `Exhausted` and the caller removes the operation.
    pub fn record_failure(&mut self, max_retries: u32) -> FailureOutcome {
        let next = self.retry_count.saturating_add(1);
        if next < max_retries {
            self.retry_count = next;
            FailureOutcome::Parked
        } else {
            self.retry_count = max_retries;
            FailureOutcome::Exhausted
        }
    }
}
