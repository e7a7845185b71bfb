//! # Error Types
//!
//! Error handling for network channels.
//!
//! Two layers live here:
//! - [`ChannelError`] is the `Result` error returned by fallible operations.
//! - [`NetworkErrorCode`] is the taxonomy carried by the channel's error event.
//!   Every `ChannelError` maps onto exactly one code through [`ChannelError::code`].
//!
//! ## Error Categories
//! - **Transient**: `ConnectError`, `SendError`, `ReceiveError`, `SocketError`.
//!   These deactivate the channel and never auto-retry.
//! - **Protocol violations**: `PacketHeaderInvalid`, `DeserializePacketError`.
//!   The stream is desynchronized and the channel is always closed.
//! - **Liveness**: `HeartbeatTimeout`. Fatal for the channel instance.
//!
//! ## Example Usage
//! ```rust
//! use network_channel::error::{ChannelError, NetworkErrorCode, Result};
//!
//! fn check(len: u32, max: usize) -> Result<()> {
//!     if len as usize > max {
//!         return Err(ChannelError::PacketHeaderInvalid(len));
//!     }
//!     Ok(())
//! }
//!
//! let err = check(10, 4).unwrap_err();
//! assert_eq!(err.code(), NetworkErrorCode::PacketHeaderInvalid);
//! assert!(err.code().is_fatal());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    pub const ERR_NOT_CONNECTED: &str = "You must connect first";
    pub const ERR_CHANNEL_INACTIVE: &str = "Channel is not active";
    pub const ERR_CONNECT_TIMEOUT: &str = "Connection attempt timed out";
    pub const ERR_TRANSPORT_NOT_INITIALIZED: &str = "Transport has not been initialized";
    pub const ERR_TRANSPORT_NOT_OPEN: &str = "Transport is not open";
    pub const ERR_EMPTY_RECEIVE: &str = "Received an empty message";
    pub const ERR_HEARTBEAT_TIMEOUT: &str = "Missed heartbeat threshold exceeded";
    pub const ERR_WRITER_GONE: &str = "Socket writer task has stopped";
}

/// Error taxonomy surfaced through the channel's error event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkErrorCode {
    Unknown,
    AddressFamilyError,
    SocketError,
    ConnectError,
    SendError,
    ReceiveError,
    SerializeError,
    PacketHeaderInvalid,
    DeserializePacketError,
    HeartbeatTimeout,
}

impl NetworkErrorCode {
    /// Fatal codes indicate the channel instance cannot continue and is closed.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            NetworkErrorCode::PacketHeaderInvalid
                | NetworkErrorCode::DeserializePacketError
                | NetworkErrorCode::HeartbeatTimeout
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NetworkErrorCode::Unknown => "Unknown",
            NetworkErrorCode::AddressFamilyError => "AddressFamilyError",
            NetworkErrorCode::SocketError => "SocketError",
            NetworkErrorCode::ConnectError => "ConnectError",
            NetworkErrorCode::SendError => "SendError",
            NetworkErrorCode::ReceiveError => "ReceiveError",
            NetworkErrorCode::SerializeError => "SerializeError",
            NetworkErrorCode::PacketHeaderInvalid => "PacketHeaderInvalid",
            NetworkErrorCode::DeserializePacketError => "DeserializePacketError",
            NetworkErrorCode::HeartbeatTimeout => "HeartbeatTimeout",
        }
    }
}

impl fmt::Display for NetworkErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ChannelError is the primary error type for all channel operations
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Invalid channel state: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{}", constants::ERR_NOT_CONNECTED)]
    NotConnected,

    #[error("Invalid packet header: declared length {0}")]
    PacketHeaderInvalid(u32),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("{code} ({}): {message}", display_code(.transport_code))]
    Transport {
        code: NetworkErrorCode,
        transport_code: Option<i32>,
        message: String,
    },

    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ChannelError {
    /// Build a transport error, keeping the native code and diagnostic text.
    pub fn transport(
        code: NetworkErrorCode,
        transport_code: Option<i32>,
        message: impl Into<String>,
    ) -> Self {
        ChannelError::Transport {
            code,
            transport_code,
            message: message.into(),
        }
    }

    /// Map this error onto the error-event taxonomy.
    pub fn code(&self) -> NetworkErrorCode {
        match self {
            ChannelError::Io(_) => NetworkErrorCode::SocketError,
            ChannelError::Serialization(_) => NetworkErrorCode::SerializeError,
            ChannelError::InvalidState { .. } => NetworkErrorCode::Unknown,
            ChannelError::NotConnected => NetworkErrorCode::SendError,
            ChannelError::PacketHeaderInvalid(_) => NetworkErrorCode::PacketHeaderInvalid,
            ChannelError::OversizedPacket(_) => NetworkErrorCode::SerializeError,
            ChannelError::Transport { code, .. } => *code,
            ChannelError::NoRuntime(_) => NetworkErrorCode::ConnectError,
            ChannelError::ConfigError(_) => NetworkErrorCode::Unknown,
            ChannelError::Custom(_) => NetworkErrorCode::Unknown,
        }
    }

    /// Native transport code, when the failing layer supplied one.
    pub fn transport_code(&self) -> Option<i32> {
        match self {
            ChannelError::Io(e) => e.raw_os_error(),
            ChannelError::Transport { transport_code, .. } => *transport_code,
            _ => None,
        }
    }
}

fn display_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Type alias for Results using ChannelError
pub type Result<T> = std::result::Result<T, ChannelError>;
