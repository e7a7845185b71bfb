//! # Network Channel
//!
//! A transport-agnostic network channel: one connection lifecycle shared by
//! interchangeable transport bindings, with length-prefixed framing, a
//! heartbeat monitor and pooled packet buffers.
//!
//! ## Architecture
//! - **`channel`**: the [`NetworkChannel`] state machine, heartbeat monitor and
//!   the [`ChannelHelper`] boundary to the packet layer
//! - **`transport`**: the [`Transport`] contract with an async TCP binding and a
//!   host-bridged binding
//! - **`core`**: framing engine, tokio codec and packet serialization
//! - **`utils`**: shared packet pool, metrics and logging setup
//! - **`config`**: TOML/env configuration with validation
//! - **`error`**: [`ChannelError`] and the [`NetworkErrorCode`] taxonomy
//!
//! ## Wire Format
//! ```text
//! [Length(4, big-endian u32)] [Body(Length)]
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use network_channel::channel::helper::FnHelper;
//! use network_channel::config::ChannelConfig;
//! use network_channel::transport::socket::SocketTransport;
//! use network_channel::{NetworkChannel, PacketPool, PooledBuffer};
//!
//! # #[tokio::main]
//! # async fn main() -> network_channel::Result<()> {
//! let config = ChannelConfig::default();
//! let pool = PacketPool::new(config.pool.clone());
//! let helper = Arc::new(FnHelper::from_fn(|_channel: &NetworkChannel, body: PooledBuffer| {
//!     println!("received {} bytes", body.len());
//!     Ok(())
//! }));
//!
//! let channel = NetworkChannel::new(
//!     "game",
//!     SocketTransport::new(config.socket.clone()),
//!     helper,
//!     pool,
//!     config.channel.clone(),
//! );
//! channel.on_error(|ch, err| eprintln!("{}: {err}", ch.name()));
//! channel.connect(IpAddr::V4(Ipv4Addr::LOCALHOST), 7777, None)?;
//!
//! loop {
//!     channel.update(Duration::from_millis(16));
//!     tokio::time::sleep(Duration::from_millis(16)).await;
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod core;
pub mod error;
pub mod transport;
pub mod utils;

pub use channel::helper::ChannelHelper;
pub use channel::state::UserData;
pub use channel::{ChannelErrorEvent, ConnectionState, NetworkChannel};
pub use config::ChannelConfig;
pub use error::{ChannelError, NetworkErrorCode, Result};
pub use transport::{ServiceType, Transport};
pub use utils::buffer_pool::{PacketPool, PooledBuffer};
