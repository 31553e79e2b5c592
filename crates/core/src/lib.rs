// deferq Core - Domain Logic & Ports
// NO infrastructure dependencies: storage, connectivity and transport are ports

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{DrainOutcome, DrainReport, OfflineQueue};
pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
