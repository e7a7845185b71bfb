//! # Utility Modules
//!
//! Supporting pieces shared by every channel.
//!
//! ## Components
//! - **Buffer Pool**: keyed packet buffer pool shared across channels
//! - **Logging**: `tracing-subscriber` setup from configuration
//! - **Metrics**: thread-safe observability counters

pub mod buffer_pool;
pub mod logging;
pub mod metrics;

pub use buffer_pool::{PacketPool, PooledBuffer};
