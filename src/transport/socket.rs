//! # Async Socket Transport
//!
//! Native TCP binding driven by tokio tasks.
//!
//! `open` spawns one task that connects, then splits the stream into a reader
//! loop and a writer loop. Each completion runs the channel's handler directly
//! on the worker that finished it, through the [`EventSink`] of the connect
//! session it belongs to. Writes are drained from an unbounded queue one frame at
//! a time, so frames reach the socket in submission order with at most one write
//! outstanding.
//!
//! `close` cancels every task of the session. Completions that still slip out are
//! discarded by the channel because their session no longer matches.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use crate::config::SocketConfig;
use crate::error::{constants, ChannelError, NetworkErrorCode, Result};
use crate::transport::{
    not_open, Endpoint, EventSink, SendProgress, ServiceType, Transport, TransportEvent,
};
use crate::utils::buffer_pool::PooledBuffer;

const READ_CHUNK: usize = 8 * 1024;

pub struct SocketTransport {
    config: SocketConfig,
    handle: Option<Handle>,
    endpoint: Option<SocketAddr>,
    session: Option<Session>,
}

struct Session {
    open: Arc<AtomicBool>,
    writer: mpsc::UnboundedSender<PooledBuffer>,
    cancel: CancellationToken,
}

impl SocketTransport {
    pub fn new(config: SocketConfig) -> Self {
        Self {
            config,
            handle: None,
            endpoint: None,
            session: None,
        }
    }

    /// Spawn tasks on `handle` instead of the runtime current at `open`.
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    fn runtime(&self) -> Result<Handle> {
        match &self.handle {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|e| ChannelError::NoRuntime(e.to_string())),
        }
    }
}

impl Default for SocketTransport {
    fn default() -> Self {
        Self::new(SocketConfig::default())
    }
}

impl Transport for SocketTransport {
    fn service_type(&self) -> ServiceType {
        ServiceType::Tcp
    }

    fn initialize(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.close();
        self.endpoint = Some(endpoint.socket_addr());
        Ok(())
    }

    #[instrument(skip(self, sink), fields(session = sink.session()))]
    fn open(&mut self, sink: EventSink) -> Result<()> {
        let addr = self.endpoint.ok_or_else(|| {
            ChannelError::transport(
                NetworkErrorCode::ConnectError,
                None,
                constants::ERR_TRANSPORT_NOT_INITIALIZED,
            )
        })?;
        let runtime = self.runtime()?;
        self.close();

        let (writer, queue) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        runtime.spawn(run_session(
            addr,
            self.config.clone(),
            queue,
            sink,
            open.clone(),
            cancel.clone(),
        ));

        self.session = Some(Session {
            open,
            writer,
            cancel,
        });
        Ok(())
    }

    fn send_bytes(&mut self, frame: PooledBuffer) -> Result<SendProgress> {
        let session = self
            .session
            .as_ref()
            .filter(|s| s.open.load(Ordering::Acquire))
            .ok_or_else(|| not_open(NetworkErrorCode::SendError))?;

        session.writer.send(frame).map_err(|_| {
            ChannelError::transport(NetworkErrorCode::SendError, None, constants::ERR_WRITER_GONE)
        })?;
        Ok(SendProgress::InFlight)
    }

    fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.open.store(false, Ordering::Release);
            session.cancel.cancel();
            debug!("socket session cancelled");
        }
    }

    fn is_open(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.open.load(Ordering::Acquire))
            .unwrap_or(false)
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_session(
    addr: SocketAddr,
    config: SocketConfig,
    queue: mpsc::UnboundedReceiver<PooledBuffer>,
    sink: EventSink,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let stream = tokio::select! {
        _ = cancel.cancelled() => return,
        result = connect(addr, config.connect_timeout) => match result {
            Ok(stream) => stream,
            Err(event) => {
                sink.deliver(event);
                return;
            }
        },
    };

    if config.nodelay {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "failed to set TCP_NODELAY");
        }
    }

    let (reader, writer) = stream.into_split();
    open.store(true, Ordering::Release);
    debug!(peer = %addr, "socket connected");

    tokio::spawn(write_loop(writer, queue, sink.clone(), cancel.clone()));
    sink.deliver(TransportEvent::Opened);

    read_loop(reader, &sink, &cancel).await;
    open.store(false, Ordering::Release);
}

async fn connect(addr: SocketAddr, timeout: Duration) -> std::result::Result<TcpStream, TransportEvent> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(TransportEvent::from_io(NetworkErrorCode::ConnectError, &e)),
        Err(_) => Err(TransportEvent::error(
            NetworkErrorCode::ConnectError,
            constants::ERR_CONNECT_TIMEOUT,
        )),
    }
}

async fn read_loop(mut reader: OwnedReadHalf, sink: &EventSink, cancel: &CancellationToken) {
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = reader.read_buf(&mut buf) => result,
        };

        match result {
            Ok(0) => {
                debug!("peer closed the socket");
                sink.deliver(TransportEvent::Closed);
                return;
            }
            Ok(n) => {
                trace!(bytes = n, "socket read");
                sink.deliver(TransportEvent::Message(buf.split().freeze()));
                buf.reserve(READ_CHUNK);
            }
            Err(e) => {
                sink.deliver(TransportEvent::from_io(NetworkErrorCode::ReceiveError, &e));
                return;
            }
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<PooledBuffer>,
    sink: EventSink,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = queue.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = writer.write_all(&frame) => result,
        };

        match result {
            Ok(()) => {
                trace!(bytes = frame.len(), "socket write complete");
                sink.deliver(TransportEvent::SendComplete { bytes: frame.len() });
            }
            Err(e) => {
                sink.deliver(TransportEvent::from_io(NetworkErrorCode::SendError, &e));
                break;
            }
        }
    }
    let _ = writer.shutdown().await;
}
