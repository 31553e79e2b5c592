// Offline Queue - durable "submit now, deliver eventually" queue

mod drain;

pub use drain::{DrainOutcome, DrainReport};

use crate::application::retry::RetryPolicy;
use crate::domain::{
    OfflineRequest, OperationId, OperationPayload, OperationState, PendingQueue, QueueConfig,
    QueuedOperation,
};
use crate::error::Result;
use crate::port::{
    ConnectivityMonitor, Delivery, DeliveryError, IdProvider, PersistentStore, TimeProvider,
};
use drain::DrainGuard;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock, Weak};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Called with an operation that exhausted its retries, and the last error
pub type PermanentFailureHook = Arc<dyn Fn(&QueuedOperation, &DeliveryError) + Send + Sync>;

/// Queue composition by state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub parked: usize,
}

/// Durable offline operation queue
///
/// Operations are appended and persisted on submission, then delivered in
/// order whenever the device is online. At most one drain pass runs at a time;
/// a failed delivery parks the operation at the tail and ends the pass.
///
/// Cloning is cheap: every clone is a handle to the same queue. Build one
/// instance in the composition root and pass it where needed.
#[derive(Clone)]
pub struct OfflineQueue {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    config: QueueConfig,
    store: Arc<dyn PersistentStore>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    delivery: Arc<dyn Delivery>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    retry_policy: RetryPolicy,
    queue: Mutex<PendingQueue>,
    draining: watch::Sender<bool>,
    initialized: AtomicBool,
    listener: StdMutex<Option<JoinHandle<()>>>,
    failure_hook: RwLock<Option<PermanentFailureHook>>,
}

impl OfflineQueue {
    /// Create a new queue
    ///
    /// The queue starts empty; call `initialize` to restore the persisted
    /// snapshot and start listening for connectivity changes.
    ///
    /// # Errors
    /// - `AppError::Domain` if the config is invalid
    pub fn new(
        config: QueueConfig,
        store: Arc<dyn PersistentStore>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        delivery: Arc<dyn Delivery>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let (draining, _) = watch::channel(false);
        let retry_policy = RetryPolicy::new(config.max_retries);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                store,
                connectivity,
                delivery,
                id_provider,
                time_provider,
                retry_policy,
                queue: Mutex::new(PendingQueue::new()),
                draining,
                initialized: AtomicBool::new(false),
                listener: StdMutex::new(None),
                failure_hook: RwLock::new(None),
            }),
        })
    }

    /// Register a callback for operations dropped after exhausting their retries
    pub fn on_permanent_failure<F>(&self, hook: F)
    where
        F: Fn(&QueuedOperation, &DeliveryError) + Send + Sync + 'static,
    {
        if let Ok(mut slot) = self.inner.failure_hook.write() {
            *slot = Some(Arc::new(hook));
        }
    }

    /// Restore the persisted queue and subscribe to connectivity changes
    ///
    /// Never fails on bad storage: a missing, unreadable or corrupt snapshot
    /// yields an empty queue. Operations submitted before `initialize` are kept
    /// behind the restored ones.
    ///
    /// Only the first call reads the store. Once initialized the in-memory
    /// queue is authoritative: a snapshot that missed a failed persist must not
    /// bring back delivered operations or older retry counts. Later calls only
    /// make sure the connectivity listener is running.
    pub async fn initialize(&self) -> Result<()> {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            debug!("Offline queue already initialized, keeping in-memory state");
            self.start_listener();
            return Ok(());
        }

        let restored = self.inner.load().await;

        let restored_len = {
            let mut queue = self.inner.queue.lock().await;
            let submitted_early = std::mem::take(&mut *queue);
            let early_count = submitted_early.len();

            *queue = restored;
            for op in submitted_early.iter() {
                if !queue.iter().any(|existing| existing.id == op.id) {
                    queue.push_back(op.clone());
                }
            }
            if early_count > 0 {
                self.inner.persist(&queue).await;
            }
            queue.len()
        };

        self.start_listener();

        let online = self.inner.connectivity.is_online().await;
        info!(
            store_key = %self.inner.config.store_key,
            restored = restored_len,
            online = online,
            "Offline queue initialized"
        );

        if online && restored_len > 0 {
            Inner::trigger_drain(&self.inner);
        }
        Ok(())
    }

    fn start_listener(&self) {
        let Ok(mut slot) = self.inner.listener.lock() else {
            error!("Listener slot poisoned, connectivity changes will not trigger drains");
            return;
        };
        if slot.is_some() {
            debug!("Connectivity listener already running");
            return;
        }

        let rx = self.inner.connectivity.subscribe();
        let weak = Arc::downgrade(&self.inner);
        *slot = Some(tokio::spawn(listen_for_connectivity(weak, rx)));
    }

    /// Submit an operation for eventual delivery
    ///
    /// Returns the new operation's id once it is queued. Delivery happens in
    /// the background when online; a failed persist is logged and the
    /// in-memory queue stays authoritative.
    pub async fn enqueue(
        &self,
        payload: OperationPayload,
        correlation_id: Option<String>,
    ) -> OperationId {
        let op = QueuedOperation::new(
            self.inner.id_provider.generate_id(),
            self.inner.time_provider.now_millis(),
            payload,
        )
        .with_correlation_id(correlation_id);
        let op_id = op.id.clone();

        let size = {
            let mut queue = self.inner.queue.lock().await;
            queue.push_back(op);
            self.inner.persist(&queue).await;
            queue.len()
        };
        debug!(op_id = %op_id, queue_size = size, "Operation enqueued");

        if self.inner.connectivity.is_online().await {
            Inner::trigger_drain(&self.inner);
        }
        op_id
    }

    /// Submit an HTTP request to replay once online
    ///
    /// # Errors
    /// - `AppError::Domain` if the endpoint is not a path
    /// - `AppError::Serialization` if the request cannot be encoded
    pub async fn enqueue_request(
        &self,
        request: OfflineRequest,
        correlation_id: Option<String>,
    ) -> Result<OperationId> {
        request.validate()?;
        let payload = request.into_payload()?;
        Ok(self.enqueue(payload, correlation_id).await)
    }

    /// Number of queued operations
    pub async fn size(&self) -> usize {
        self.inner.queue.lock().await.len()
    }

    /// Copy of the queue in delivery order
    pub async fn snapshot(&self) -> Vec<QueuedOperation> {
        self.inner.queue.lock().await.snapshot()
    }

    pub async fn stats(&self) -> QueueStats {
        let queue = self.inner.queue.lock().await;
        QueueStats {
            pending: queue.count_by_state(OperationState::Pending),
            parked: queue.count_by_state(OperationState::Parked),
        }
    }

    /// Empty the queue in memory and in storage (logout / reset)
    ///
    /// Safe during an active drain: the pass finds nothing left and stops, and
    /// the result of a delivery that was in flight is discarded.
    ///
    /// # Errors
    /// - `AppError::Store` if the persisted copy could not be removed; the
    ///   in-memory queue is empty regardless
    pub async fn clear(&self) -> Result<()> {
        let mut queue = self.inner.queue.lock().await;
        let dropped = queue.len();
        queue.clear();

        if let Err(e) = self.inner.store.remove(&self.inner.config.store_key).await {
            error!(error = %e, "Failed to remove persisted queue");
            return Err(e);
        }
        info!(dropped = dropped, "Offline queue cleared");
        Ok(())
    }

    /// Run a drain pass now, regardless of the connectivity signal
    ///
    /// Returns `DrainOutcome::AlreadyRunning` without doing anything if a pass
    /// is in progress.
    pub async fn sync_now(&self) -> DrainReport {
        match DrainGuard::acquire(&self.inner) {
            Some(guard) => guard.run().await,
            None => DrainReport::already_running(),
        }
    }

    /// Wait until no drain pass is running
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.draining.subscribe();
        let _ = rx.wait_for(|draining| !*draining).await;
    }

    pub fn is_draining(&self) -> bool {
        *self.inner.draining.borrow()
    }

    /// Stop reacting to connectivity changes
    pub fn shutdown(&self) {
        self.inner.stop_listener();
    }
}

impl Inner {
    /// Start a background drain pass unless one is already running
    fn trigger_drain(inner: &Arc<Inner>) {
        if let Some(guard) = DrainGuard::acquire(inner) {
            tokio::spawn(async move {
                let report = guard.run().await;
                debug!(?report, "Background drain finished");
            });
        }
    }

    async fn load(&self) -> PendingQueue {
        let key = &self.config.store_key;
        match self.store.get(key).await {
            Ok(Some(raw)) => match PendingQueue::from_json(&raw) {
                Ok(queue) => queue,
                Err(e) => {
                    warn!(store_key = %key, error = %e, "Discarding unreadable queue snapshot");
                    PendingQueue::new()
                }
            },
            Ok(None) => PendingQueue::new(),
            Err(e) => {
                error!(store_key = %key, error = %e, "Failed to read queue snapshot");
                PendingQueue::new()
            }
        }
    }

    /// Write the whole queue under the store key
    ///
    /// Callers hold the queue lock, so writes land in mutation order.
    async fn persist(&self, queue: &PendingQueue) {
        let raw = match queue.to_json() {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "Failed to serialize queue snapshot");
                return;
            }
        };
        if let Err(e) = self.store.set(&self.config.store_key, &raw).await {
            warn!(
                store_key = %self.config.store_key,
                queue_size = queue.len(),
                error = %e,
                "Failed to persist queue, keeping in-memory state"
            );
        }
    }

    fn permanent_failure(&self, op: &QueuedOperation, error: &DeliveryError) {
        let hook = match self.failure_hook.read() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        if let Some(hook) = hook {
            hook(op, error);
        }
    }

    fn stop_listener(&self) {
        if let Ok(mut slot) = self.listener.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.stop_listener();
    }
}

/// Drain whenever connectivity comes back and there is work queued
async fn listen_for_connectivity(weak: Weak<Inner>, mut rx: watch::Receiver<bool>) {
    while rx.changed().await.is_ok() {
        let online = *rx.borrow_and_update();
        let Some(inner) = weak.upgrade() else {
            break;
        };

        let size = inner.queue.lock().await.len();
        info!(online = online, queue_size = size, "Connectivity changed");
        if online && size > 0 {
            Inner::trigger_drain(&inner);
        }
    }
    debug!("Connectivity listener stopped");
}
