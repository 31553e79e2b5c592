// Application Layer - Use Cases and Business Logic

pub mod constants;
pub mod offline_queue;
pub mod retry;

// Re-exports
pub use offline_queue::{DrainOutcome, DrainReport, OfflineQueue, QueueStats};
pub use retry::{RetryDecision, RetryPolicy};
