// Domain Layer - Pure business logic and entities

pub mod error;
pub mod operation;
pub mod queue;
pub mod request;

// Re-exports
pub use error::DomainError;
pub use operation::{
    FailureOutcome, OperationId, OperationPayload, OperationState, QueuedOperation,
};
pub use queue::{PendingQueue, QueueConfig};
pub use request::{HttpMethod, OfflineRequest};
