//! # Bridge Transport
//!
//! Binding for connections owned by the host (for example a browser WebSocket
//! reached through a scripting bridge). The channel never touches the socket; it
//! only calls the [`BridgeConnection`] methods and subscribes four callback slots
//! when the transport is constructed.
//!
//! The host invokes those callbacks whenever it likes. They only enqueue events;
//! nothing reaches the channel until its update tick calls
//! [`Transport::drain_events`], which first asks the host to flush its own queue
//! through [`BridgeConnection::dispatch_message_queue`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tracing::{debug, instrument, trace};

use crate::config::BridgeConfig;
use crate::error::{ChannelError, NetworkErrorCode, Result};
use crate::transport::{Endpoint, EventSink, SendProgress, ServiceType, Transport, TransportEvent};
use crate::utils::buffer_pool::PooledBuffer;

/// Failure reported by the host connection, with its native code if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeFault {
    pub code: Option<i32>,
    pub message: String,
}

impl BridgeFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    fn into_error(self, code: NetworkErrorCode) -> ChannelError {
        ChannelError::transport(code, self.code, self.message)
    }
}

impl fmt::Display for BridgeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

pub type BridgeResult<T> = std::result::Result<T, BridgeFault>;

/// Connection object supplied by the host.
pub trait BridgeConnection: Send {
    fn initialize(&mut self, url: &str, origin: Option<&str>) -> BridgeResult<()>;

    fn connect(&mut self) -> BridgeResult<()>;

    fn send(&mut self, bytes: &[u8]) -> BridgeResult<()>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Invoke the subscribed callbacks for everything the host has queued.
    ///
    /// Runs inside [`NetworkChannel::update`](crate::NetworkChannel::update)
    /// with the channel's state lock held. Implementations must only fire the
    /// callbacks; calling back into the channel from here (even a read such as
    /// `is_active`) deadlocks.
    fn dispatch_message_queue(&mut self);

    /// Store the callback slots. Called once, when the transport is built.
    fn subscribe(&mut self, callbacks: BridgeCallbacks);
}

type Slot<T> = Arc<dyn Fn(T) + Send + Sync>;

/// The four callback slots a host connection reports through.
#[derive(Clone)]
pub struct BridgeCallbacks {
    pub on_open: Slot<()>,
    pub on_message: Slot<Vec<u8>>,
    pub on_error: Slot<BridgeFault>,
    pub on_close: Slot<()>,
}

impl fmt::Debug for BridgeCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeCallbacks").finish_non_exhaustive()
    }
}

type EventQueue = Arc<Mutex<VecDeque<TransportEvent>>>;

fn push(queue: &EventQueue, event: TransportEvent) {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push_back(event);
}

pub struct BridgeTransport<C: BridgeConnection> {
    connection: C,
    config: BridgeConfig,
    queue: EventQueue,
}

impl<C: BridgeConnection> BridgeTransport<C> {
    pub fn new(mut connection: C, config: BridgeConfig) -> Self {
        let queue: EventQueue = Arc::new(Mutex::new(VecDeque::new()));

        let callbacks = BridgeCallbacks {
            on_open: {
                let queue = queue.clone();
                Arc::new(move |()| push(&queue, TransportEvent::Opened))
            },
            on_message: {
                let queue = queue.clone();
                Arc::new(move |bytes: Vec<u8>| {
                    push(&queue, TransportEvent::Message(Bytes::from(bytes)))
                })
            },
            on_error: {
                let queue = queue.clone();
                Arc::new(move |fault: BridgeFault| {
                    push(
                        &queue,
                        TransportEvent::Error {
                            code: NetworkErrorCode::SocketError,
                            transport_code: fault.code,
                            message: fault.message,
                        },
                    )
                })
            },
            on_close: {
                let queue = queue.clone();
                Arc::new(move |()| push(&queue, TransportEvent::Closed))
            },
        };
        connection.subscribe(callbacks);

        Self {
            connection,
            config,
            queue,
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// URL handed to the host for `endpoint`.
    pub fn url_for(&self, endpoint: &Endpoint) -> String {
        format!("{}://{}{}", self.config.scheme, endpoint, self.config.path)
    }

    /// Events received but not yet drained.
    pub fn queued(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<C: BridgeConnection> Transport for BridgeTransport<C> {
    fn service_type(&self) -> ServiceType {
        ServiceType::WebSocket
    }

    fn initialize(&mut self, endpoint: &Endpoint) -> Result<()> {
        let url = self.url_for(endpoint);
        debug!(%url, "initializing bridged connection");
        self.connection
            .initialize(&url, self.config.origin.as_deref())
            .map_err(|f| f.into_error(NetworkErrorCode::ConnectError))
    }

    #[instrument(skip(self, _sink))]
    fn open(&mut self, _sink: EventSink) -> Result<()> {
        self.connection
            .connect()
            .map_err(|f| f.into_error(NetworkErrorCode::ConnectError))
    }

    fn send_bytes(&mut self, frame: PooledBuffer) -> Result<SendProgress> {
        self.connection
            .send(&frame)
            .map_err(|f| f.into_error(NetworkErrorCode::SendError))?;
        trace!(bytes = frame.len(), "bridged send");
        Ok(SendProgress::Completed)
    }

    fn close(&mut self) {
        self.connection.close();
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn is_open(&self) -> bool {
        self.connection.is_open()
    }

    /// A close reported while the host says it is open belongs to a socket
    /// this transport already closed, and is dropped.
    fn drain_events(&mut self, out: &mut Vec<TransportEvent>) {
        self.connection.dispatch_message_queue();
        let open = self.connection.is_open();
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        for event in queue.drain(..) {
            if open && matches!(event, TransportEvent::Closed) {
                trace!("stale host close dropped");
                continue;
            }
            out.push(event);
        }
    }
}
