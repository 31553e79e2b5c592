// Port Layer - Interfaces for external dependencies

pub mod connectivity;
pub mod delivery;
pub mod id_provider; // For deterministic testing
pub mod store;
pub mod time_provider;

// Re-exports
pub use connectivity::{ConnectivityMonitor, ManualConnectivity};
pub use delivery::{delivery_fn, Delivery, DeliveryError, FnDelivery};
pub use id_provider::IdProvider;
pub use store::PersistentStore;
pub use time_provider::TimeProvider;
