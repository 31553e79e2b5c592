// Queue constants (no magic values)

/// Delivery attempts per operation before it is dropped
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Store key holding the serialized queue
pub const DEFAULT_STORE_KEY: &str = "offline_queue";
