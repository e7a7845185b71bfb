//! # Transport Bindings
//!
//! The pluggable layer that performs the actual I/O for a channel.
//!
//! Every binding implements [`Transport`]. Completions are reported as
//! [`TransportEvent`]s in one of two ways:
//! - **Continuation**: the binding calls [`EventSink::deliver`] from whatever
//!   worker finished the operation ([`socket::SocketTransport`]).
//! - **Queue drain**: events wait in the binding until the owning channel's
//!   update tick calls [`Transport::drain_events`] ([`bridge::BridgeTransport`]).
//!
//! Both paths land in the same channel state machine, which re-checks the
//! connect session and liveness before acting on any event.

pub mod bridge;
pub mod socket;

use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Weak;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::channel::NetworkChannel;
use crate::error::{ChannelError, NetworkErrorCode, Result};
use crate::utils::buffer_pool::PooledBuffer;

/// Kind of transport behind a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
#[non_exhaustive]
pub enum ServiceType {
    /// Socket owned by the host and reached through callbacks.
    WebSocket = 0,
    /// Native asynchronous TCP socket.
    Tcp = 1,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceType::WebSocket => f.write_str("WebSocket"),
            ServiceType::Tcp => f.write_str("Tcp"),
        }
    }
}

/// Resolved remote address of a connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub address: IpAddr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self { address, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.socket_addr().fmt(f)
    }
}

/// Completion signal from a transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// The connection reports itself open.
    Opened,
    /// Bytes arrived from the peer, in arbitrary chunking.
    Message(Bytes),
    /// The in-flight frame was fully written.
    SendComplete { bytes: usize },
    /// The transport failed. `code` is already normalized.
    Error {
        code: NetworkErrorCode,
        transport_code: Option<i32>,
        message: String,
    },
    /// The peer or the host closed the connection.
    Closed,
}

impl TransportEvent {
    pub fn from_io(code: NetworkErrorCode, err: &io::Error) -> Self {
        TransportEvent::Error {
            code,
            transport_code: err.raw_os_error(),
            message: err.to_string(),
        }
    }

    pub fn error(code: NetworkErrorCode, message: impl Into<String>) -> Self {
        TransportEvent::Error {
            code,
            transport_code: None,
            message: message.into(),
        }
    }
}

/// Result of handing a frame to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendProgress {
    /// The frame was written before `send_bytes` returned.
    Completed,
    /// A [`TransportEvent::SendComplete`] will follow.
    InFlight,
}

/// Continuation handle into the owning channel for one connect session.
///
/// Events delivered after the channel closed, reconnected, or was dropped are
/// discarded by the channel.
#[derive(Clone)]
pub struct EventSink {
    channel: Weak<NetworkChannel>,
    session: u64,
}

impl EventSink {
    pub(crate) fn new(channel: Weak<NetworkChannel>, session: u64) -> Self {
        Self { channel, session }
    }

    /// Run the channel's completion handler for `event` on the calling context.
    ///
    /// Returns `false` once the channel no longer exists.
    pub fn deliver(&self, event: TransportEvent) -> bool {
        match self.channel.upgrade() {
            Some(channel) => {
                channel.on_transport_event(self.session, event);
                true
            }
            None => false,
        }
    }

    pub fn session(&self) -> u64 {
        self.session
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("session", &self.session)
            .finish()
    }
}

/// Contract shared by all transport bindings.
///
/// Calls are made with the owning channel's state locked; implementations must
/// not block and must not call back into the channel synchronously.
pub trait Transport: Send {
    fn service_type(&self) -> ServiceType;

    /// Prepare for a connection to `endpoint`. May be called again after `close`.
    fn initialize(&mut self, endpoint: &Endpoint) -> Result<()>;

    /// Start opening the connection. Completion arrives as [`TransportEvent::Opened`]
    /// or [`TransportEvent::Error`].
    fn open(&mut self, sink: EventSink) -> Result<()>;

    /// Hand one complete frame to the transport.
    fn send_bytes(&mut self, frame: PooledBuffer) -> Result<SendProgress>;

    /// Terminate the connection. Must be idempotent.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Move queued events into `out`. Continuation-driven bindings have nothing to drain.
    fn drain_events(&mut self, _out: &mut Vec<TransportEvent>) {}
}

pub(crate) fn not_open(code: NetworkErrorCode) -> ChannelError {
    ChannelError::transport(code, None, crate::error::constants::ERR_TRANSPORT_NOT_OPEN)
}
