//! # Core Framing Components
//!
//! Low-level packet handling shared by every transport binding.
//!
//! ## Components
//! - **Framing**: length-prefix parsing with partial-read handling
//! - **Codec**: Tokio codec for peers speaking the same wire format
//! - **Serialization**: outbound packet bodies and bincode helpers
//!
//! ## Wire Format
//! ```text
//! [Length(4)] [Body(Length)]
//! ```
//!
//! ## Safety
//! - Length validated against `max_packet_size` before any allocation
//! - Out-of-range lengths are protocol violations, never retried

pub mod codec;
pub mod framing;
pub mod serialization;
