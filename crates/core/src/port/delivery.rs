// Delivery Port
// Abstraction over the transport that actually sends a queued operation

use crate::domain::QueuedOperation;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use thiserror::Error;

/// Delivery errors (any of them counts as a failed attempt)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Delivery failed: {0}")]
    Other(String),
}

/// Delivery trait
///
/// Implementations must return an error for any failure, partial ones included.
/// There is no timeout around `deliver`: an implementation that can hang must
/// enforce its own, otherwise it stalls the drain.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, op: &QueuedOperation) -> Result<(), DeliveryError>;
}

type BoxedDeliveryFn =
    Box<dyn Fn(QueuedOperation) -> BoxFuture<'static, Result<(), DeliveryError>> + Send + Sync>;

/// Delivery backed by an async closure
pub struct FnDelivery {
    f: BoxedDeliveryFn,
}

/// Wrap an async closure as a `Delivery`
///
/// # Example
/// ```text
/// let delivery = delivery_fn(|op| async move {
///     client.send(op.payload).await.map_err(|e| DeliveryError::Transport(e.to_string()))
/// });
/// ```
pub fn delivery_fn<F, Fut>(f: F) -> FnDelivery
where
    F: Fn(QueuedOperation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DeliveryError>> + Send + 'static,
{
    FnDelivery {
        f: Box::new(move |op| -> BoxFuture<'static, Result<(), DeliveryError>> {
            Box::pin(f(op))
        }),
    }
}

#[async_trait]
impl Delivery for FnDelivery {
    async fn deliver(&self, op: &QueuedOperation) -> Result<(), DeliveryError> {
        (self.f)(op.clone()).await
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::{Notify, Semaphore};

    /// Scripted delivery: succeeds unless told to fail, records every attempt
    #[derive(Default)]
    pub struct MockDelivery {
        attempts: Mutex<Vec<String>>,
        delivered: Mutex<Vec<String>>,
        failures_left: Mutex<HashMap<String, u32>>,
        fail_all: AtomicBool,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        gate: Option<Semaphore>,
        started: Notify,
    }

    impl MockDelivery {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every delivery blocks until `release` hands out a permit
        pub fn gated() -> Self {
            Self {
                gate: Some(Semaphore::new(0)),
                ..Self::default()
            }
        }

        /// Fail the next `times` attempts for operation `id`
        pub fn fail_times(&self, id: &str, times: u32) {
            self.failures_left
                .lock()
                .unwrap()
                .insert(id.to_string(), times);
        }

        pub fn set_fail_all(&self, fail: bool) {
            self.fail_all.store(fail, Ordering::SeqCst);
        }

        /// Let `n` gated deliveries proceed
        pub fn release(&self, n: usize) {
            if let Some(gate) = &self.gate {
                gate.add_permits(n);
            }
        }

        /// Resolves once a delivery has started (and is possibly waiting on the gate)
        pub async fn wait_started(&self) {
            self.started.notified().await;
        }

        /// Ids in the order they were attempted
        pub fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }

        /// Ids in the order they were successfully delivered
        pub fn delivered(&self) -> Vec<String> {
            self.delivered.lock().unwrap().clone()
        }

        pub fn attempt_count(&self, id: &str) -> usize {
            self.attempts.lock().unwrap().iter().filter(|a| *a == id).count()
        }

        /// Highest number of deliveries observed running at once
        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Delivery for MockDelivery {
        async fn deliver(&self, op: &QueuedOperation) -> Result<(), DeliveryError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.attempts.lock().unwrap().push(op.id.clone());
            self.started.notify_one();

            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }

            let should_fail = self.fail_all.load(Ordering::SeqCst) || {
                let mut failures = self.failures_left.lock().unwrap();
                match failures.get_mut(&op.id) {
                    Some(left) if *left > 0 => {
                        *left -= 1;
                        true
                    }
                    _ => false,
                }
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if should_fail {
                return Err(DeliveryError::Transport(format!("mock failure for {}", op.id)));
            }
            self.delivered.lock().unwrap().push(op.id.clone());
            Ok(())
        }
    }
}
