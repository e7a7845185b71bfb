//! # Network Channel
//!
//! One logical connection: a [`Transport`] binding, the framing engine, the shared
//! packet pool and a heartbeat monitor composed into a single lifecycle.
//!
//! ## States
//! ```text
//! Disconnected --connect--> Connecting --opened--> Connected
//!      ^                        |                      |
//!      +-------- failure -------+------- close --------+
//! ```
//!
//! ## Event delivery
//! Observers never run inside [`NetworkChannel::connect`] or
//! [`NetworkChannel::send`]. Every state change queues its event; the queue is
//! drained outside the channel lock by [`NetworkChannel::update`], by a transport
//! continuation, or by [`NetworkChannel::close`]. Observers may therefore call
//! back into the channel, including `close` from an error observer.
//!
//! ## Stale completions
//! Each connect attempt gets a new session number, and `close` retires it.
//! Transport completions carry the session they were issued under and are
//! discarded once it no longer matches, so a late write or read can never revive
//! a closed channel or move its counters. Received packets still waiting for
//! dispatch when their session ends are dropped the same way.

pub mod heartbeat;
pub mod helper;
pub mod state;

use std::collections::VecDeque;
use std::fmt;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError, Weak};
use std::time::Duration;

use tracing::{debug, error, instrument, trace, warn};

use crate::config::{ChannelSettings, PACKET_HEADER_LENGTH};
use crate::core::framing::{patch_header, ReceiveState};
use crate::core::serialization::OutboundPacket;
use crate::error::{constants, ChannelError, NetworkErrorCode, Result};
use crate::transport::{
    Endpoint, EventSink, SendProgress, ServiceType, Transport, TransportEvent,
};
use crate::utils::buffer_pool::{PacketPool, PooledBuffer, INBOUND};
use crate::utils::metrics::global_metrics;

use heartbeat::{HeartbeatState, HeartbeatTick};
use helper::ChannelHelper;
use state::{ConnectState, SendState, UserData};

/// Lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of the error event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelErrorEvent {
    pub code: NetworkErrorCode,
    /// Native code of the failing transport, when it supplied one.
    pub transport_code: Option<i32>,
    pub message: String,
}

impl ChannelErrorEvent {
    pub fn new(
        code: NetworkErrorCode,
        transport_code: Option<i32>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            transport_code,
            message: message.into(),
        }
    }

    /// Report `err` under `code`, keeping its native code and text.
    pub fn from_error(code: NetworkErrorCode, err: &ChannelError) -> Self {
        let message = match err {
            ChannelError::Transport { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self::new(code, err.transport_code(), message)
    }

    pub fn into_error(self) -> ChannelError {
        ChannelError::transport(self.code, self.transport_code, self.message)
    }
}

impl fmt::Display for ChannelErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.transport_code {
            Some(code) => write!(f, "{} ({code}): {}", self.code, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

type ConnectedObserver = Arc<dyn Fn(&NetworkChannel, Option<&UserData>) + Send + Sync>;
type ErrorObserver = Arc<dyn Fn(&NetworkChannel, &ChannelErrorEvent) + Send + Sync>;
type MissedHeartbeatObserver = Arc<dyn Fn(&NetworkChannel, u32) + Send + Sync>;
type ClosedObserver = Arc<dyn Fn(&NetworkChannel) + Send + Sync>;

#[derive(Default)]
struct Observers {
    connected: Vec<ConnectedObserver>,
    error: Vec<ErrorObserver>,
    missed_heartbeat: Vec<MissedHeartbeatObserver>,
    closed: Vec<ClosedObserver>,
}

/// Work queued under the lock and run outside it, in order.
enum Deferred {
    Connected(Option<UserData>),
    Error(ChannelErrorEvent),
    MissedHeartbeat(u32),
    Closed,
    Heartbeat { session: u64 },
    Packet { session: u64, body: PooledBuffer },
}

struct Inner {
    state: ConnectionState,
    active: bool,
    session: u64,
    transport: Box<dyn Transport>,
    pending_connect: Option<ConnectState>,
    send_state: SendState,
    send_queue: VecDeque<PooledBuffer>,
    receive_state: ReceiveState,
    heartbeat: HeartbeatState,
    sent_packets: u64,
    received_packets: u64,
    deferred: VecDeque<Deferred>,
}

impl Inner {
    fn clear_traffic(&mut self) {
        self.sent_packets = 0;
        self.received_packets = 0;
        self.send_state.reset();
        self.send_queue.clear();
        self.receive_state.reset();
    }
}

/// A network channel over one transport binding.
///
/// Channels are created behind an `Arc`; transports hold only a weak
/// reference back, so dropping the last handle tears the channel down.
pub struct NetworkChannel {
    name: String,
    service_type: ServiceType,
    settings: ChannelSettings,
    pool: PacketPool,
    helper: Arc<dyn ChannelHelper>,
    inner: Mutex<Inner>,
    observers: RwLock<Observers>,
    dispatch_lock: Mutex<()>,
    me: Weak<NetworkChannel>,
}

impl NetworkChannel {
    pub fn new<T>(
        name: impl Into<String>,
        transport: T,
        helper: Arc<dyn ChannelHelper>,
        pool: PacketPool,
        settings: ChannelSettings,
    ) -> Arc<Self>
    where
        T: Transport + 'static,
    {
        let service_type = transport.service_type();
        let receive_state =
            ReceiveState::new(settings.receive_buffer_size, settings.max_packet_size);
        let heartbeat = HeartbeatState::new(
            settings.heartbeat_interval,
            settings.missed_heartbeat_threshold,
        );

        Arc::new_cyclic(|me| Self {
            name: name.into(),
            service_type,
            settings,
            pool,
            helper,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                active: false,
                session: 0,
                transport: Box::new(transport),
                pending_connect: None,
                send_state: SendState::default(),
                send_queue: VecDeque::new(),
                receive_state,
                heartbeat,
                sent_packets: 0,
                received_packets: 0,
                deferred: VecDeque::new(),
            }),
            observers: RwLock::new(Observers::default()),
            dispatch_lock: Mutex::new(()),
            me: me.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn pool(&self) -> &PacketPool {
        &self.pool
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Whether the channel is connected and has not been deactivated by an error.
    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn sent_packet_count(&self) -> u64 {
        self.lock().sent_packets
    }

    pub fn received_packet_count(&self) -> u64 {
        self.lock().received_packets
    }

    pub fn missed_heartbeat_count(&self) -> u32 {
        self.lock().heartbeat.missed_count()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.lock().heartbeat.interval()
    }

    /// Change the heartbeat interval. Zero disables the monitor.
    pub fn set_heartbeat_interval(&self, interval: Duration) {
        self.lock().heartbeat.set_interval(interval);
    }

    pub fn heartbeat_elapsed(&self) -> Duration {
        self.lock().heartbeat.elapsed()
    }

    /// Clear missed heartbeats and restart the current interval.
    pub fn reset_heartbeat(&self) {
        self.lock().heartbeat.reset(true);
    }

    /// Frames waiting behind the one in flight.
    pub fn send_queue_len(&self) -> usize {
        self.lock().send_queue.len()
    }

    pub fn on_connected<F>(&self, observer: F)
    where
        F: Fn(&NetworkChannel, Option<&UserData>) + Send + Sync + 'static,
    {
        self.observers_mut().connected.push(Arc::new(observer));
    }

    /// Without at least one error observer, `connect` and `send` return their
    /// failures instead of raising them.
    pub fn on_error<F>(&self, observer: F)
    where
        F: Fn(&NetworkChannel, &ChannelErrorEvent) + Send + Sync + 'static,
    {
        self.observers_mut().error.push(Arc::new(observer));
    }

    pub fn on_missed_heartbeat<F>(&self, observer: F)
    where
        F: Fn(&NetworkChannel, u32) + Send + Sync + 'static,
    {
        self.observers_mut().missed_heartbeat.push(Arc::new(observer));
    }

    pub fn on_closed<F>(&self, observer: F)
    where
        F: Fn(&NetworkChannel) + Send + Sync + 'static,
    {
        self.observers_mut().closed.push(Arc::new(observer));
    }

    /// Start connecting to `address:port`.
    ///
    /// Only valid while disconnected. The outcome arrives as the connected or
    /// error event; a transport that fails immediately reverts the channel to
    /// `Disconnected` and reports `ConnectError`.
    #[instrument(skip(self, user_data), fields(channel = %self.name))]
    pub fn connect(&self, address: IpAddr, port: u16, user_data: Option<UserData>) -> Result<()> {
        Self::ensure_disconnected(&self.lock())?;
        self.helper.prepare_for_connecting();

        let mut inner = self.lock();
        Self::ensure_disconnected(&inner)?;

        inner.session = inner.session.wrapping_add(1);
        let session = inner.session;
        inner.state = ConnectionState::Connecting;
        inner.active = false;
        inner.clear_traffic();
        inner.heartbeat.reset(true);
        global_metrics().connect_attempt();

        let endpoint = Endpoint::new(address, port);
        inner.pending_connect = Some(ConnectState::new(session, endpoint, user_data));
        debug!(%endpoint, session, "connecting");

        let sink = EventSink::new(self.me.clone(), session);
        let transport = &mut inner.transport;
        let opened = transport
            .initialize(&endpoint)
            .and_then(|()| transport.open(sink));

        if let Err(err) = opened {
            inner.transport.close();
            inner.state = ConnectionState::Disconnected;
            inner.pending_connect = None;
            inner.session = inner.session.wrapping_add(1);
            global_metrics().connect_failed();
            let event = ChannelErrorEvent::from_error(NetworkErrorCode::ConnectError, &err);
            return self.report(&mut inner, event);
        }
        Ok(())
    }

    /// Serialize `packet` and queue it for sending.
    ///
    /// Frames are written one at a time in submission order. Failures are raised
    /// as `SendError` and deactivate the channel.
    pub fn send<P>(&self, packet: &P) -> Result<()>
    where
        P: OutboundPacket + ?Sized,
    {
        let mut inner = self.lock();
        if inner.state != ConnectionState::Connected {
            let event = ChannelErrorEvent::from_error(
                NetworkErrorCode::SendError,
                &ChannelError::NotConnected,
            );
            return self.report(&mut inner, event);
        }
        if !inner.active {
            let event = ChannelErrorEvent::new(
                NetworkErrorCode::SendError,
                None,
                constants::ERR_CHANNEL_INACTIVE,
            );
            return self.report(&mut inner, event);
        }

        let frame = match self.encode(packet) {
            Ok(frame) => frame,
            Err(err) => {
                inner.active = false;
                let event = ChannelErrorEvent::from_error(NetworkErrorCode::SerializeError, &err);
                return self.report(&mut inner, event);
            }
        };
        trace!(channel = %self.name, bytes = frame.len(), "packet queued");
        inner.send_queue.push_back(frame);

        if let Err(err) = self.flush(&mut inner) {
            let event = ChannelErrorEvent::from_error(NetworkErrorCode::SendError, &err);
            return self.report(&mut inner, event);
        }
        Ok(())
    }

    /// Terminate the connection. Idempotent, and safe to call from any observer.
    #[instrument(skip(self), fields(channel = %self.name))]
    pub fn close(&self) {
        let closed = self.close_locked(&mut self.lock());
        if closed {
            debug!("channel closed");
        }
        self.dispatch();
    }

    /// Close, release the helper and drop every observer.
    pub fn shutdown(&self) {
        self.close();
        self.helper.shutdown();
        *self.observers_mut() = Observers::default();
    }

    /// Drive the channel by `elapsed`.
    ///
    /// Drains the transport's queued events, advances the heartbeat monitor and
    /// delivers every pending event. The transport is drained under the state
    /// lock, so a bridge host must not call into the channel while flushing.
    pub fn update(&self, elapsed: Duration) {
        {
            let mut inner = self.lock();

            let mut events = Vec::new();
            inner.transport.drain_events(&mut events);
            let session = inner.session;
            for event in events {
                if inner.session != session {
                    global_metrics().stale_completion();
                    continue;
                }
                self.handle_event(&mut inner, event);
            }

            if inner.state == ConnectionState::Connected && inner.active {
                self.tick_heartbeat(&mut inner, elapsed);
            }
        }
        self.dispatch();
    }

    /// Completion entry point for continuation-driven transports.
    pub(crate) fn on_transport_event(&self, session: u64, event: TransportEvent) {
        {
            let mut inner = self.lock();
            if inner.session != session {
                global_metrics().stale_completion();
                trace!(
                    channel = %self.name,
                    session,
                    current = inner.session,
                    ?event,
                    "stale completion dropped"
                );
                return;
            }
            self.handle_event(&mut inner, event);
        }
        self.dispatch();
    }

    fn handle_event(&self, inner: &mut Inner, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.handle_opened(inner),
            TransportEvent::Message(bytes) => self.handle_message(inner, &bytes),
            TransportEvent::SendComplete { bytes } => {
                if !inner.send_state.is_in_flight() {
                    warn!(channel = %self.name, bytes, "send completion without a send in flight");
                    return;
                }
                self.complete_send(inner);
                if let Err(err) = self.flush(inner) {
                    self.raise(inner, ChannelErrorEvent::from_error(NetworkErrorCode::SendError, &err));
                }
            }
            TransportEvent::Error {
                code,
                transport_code,
                message,
            } => {
                if inner.state == ConnectionState::Connecting {
                    inner.transport.close();
                    inner.state = ConnectionState::Disconnected;
                    inner.pending_connect = None;
                    inner.session = inner.session.wrapping_add(1);
                    global_metrics().connect_failed();
                    let event =
                        ChannelErrorEvent::new(NetworkErrorCode::ConnectError, transport_code, message);
                    self.raise(inner, event);
                    return;
                }

                inner.active = false;
                self.raise(inner, ChannelErrorEvent::new(code, transport_code, message));
                if code.is_fatal() {
                    self.close_locked(inner);
                }
            }
            TransportEvent::Closed => {
                debug!(channel = %self.name, "transport closed");
                self.close_locked(inner);
            }
        }
    }

    fn handle_opened(&self, inner: &mut Inner) {
        if inner.state != ConnectionState::Connecting || !inner.transport.is_open() {
            warn!(
                channel = %self.name,
                state = %inner.state,
                transport_open = inner.transport.is_open(),
                "ignoring open signal"
            );
            return;
        }

        inner.state = ConnectionState::Connected;
        inner.active = true;
        inner.clear_traffic();
        inner.heartbeat.reset(true);
        global_metrics().connect_succeeded();

        let user_data = inner
            .pending_connect
            .take()
            .and_then(ConnectState::into_user_data);
        debug!(channel = %self.name, session = inner.session, "connected");
        inner.deferred.push_back(Deferred::Connected(user_data));
    }

    fn handle_message(&self, inner: &mut Inner, bytes: &[u8]) {
        if inner.state != ConnectionState::Connected || !inner.active {
            trace!(channel = %self.name, bytes = bytes.len(), "receive on inactive channel dropped");
            return;
        }
        if bytes.is_empty() {
            debug!(channel = %self.name, "{}", constants::ERR_EMPTY_RECEIVE);
            self.close_locked(inner);
            return;
        }

        global_metrics().bytes_received(bytes.len() as u64);
        inner.receive_state.fill(bytes);
        loop {
            match inner.receive_state.next_packet() {
                Ok(Some(body)) => {
                    let mut packet = self.pool.acquire(INBOUND);
                    packet.extend_from_slice(&body);
                    inner.received_packets += 1;
                    inner
                        .heartbeat
                        .reset(self.settings.reset_heartbeat_elapsed_on_receive);
                    global_metrics().packet_received();
                    trace!(channel = %self.name, bytes = packet.len(), "packet received");
                    inner.deferred.push_back(Deferred::Packet {
                        session: inner.session,
                        body: packet,
                    });
                }
                Ok(None) => break,
                Err(err) => {
                    global_metrics().header_violation();
                    error!(channel = %self.name, error = %err, "stream desynchronized");
                    inner.active = false;
                    self.raise(
                        inner,
                        ChannelErrorEvent::from_error(NetworkErrorCode::PacketHeaderInvalid, &err),
                    );
                    self.close_locked(inner);
                    break;
                }
            }
        }
    }

    fn tick_heartbeat(&self, inner: &mut Inner, elapsed: Duration) {
        match inner.heartbeat.tick(elapsed) {
            HeartbeatTick::Idle => {}
            HeartbeatTick::Missed { count } => {
                global_metrics().heartbeat_missed();
                debug!(channel = %self.name, count, "missed heartbeat");
                inner.deferred.push_back(Deferred::MissedHeartbeat(count));
                inner.deferred.push_back(Deferred::Heartbeat {
                    session: inner.session,
                });
            }
            HeartbeatTick::TimedOut { count } => {
                global_metrics().heartbeat_timeout();
                error!(channel = %self.name, count, "heartbeat timed out");
                inner.active = false;
                let event = ChannelErrorEvent::new(
                    NetworkErrorCode::HeartbeatTimeout,
                    None,
                    constants::ERR_HEARTBEAT_TIMEOUT,
                );
                self.raise(inner, event);
                self.close_locked(inner);
            }
        }
    }

    fn encode<P>(&self, packet: &P) -> Result<PooledBuffer>
    where
        P: OutboundPacket + ?Sized,
    {
        let mut frame = self.pool.acquire(packet.kind());
        frame.extend_from_slice(&[0u8; PACKET_HEADER_LENGTH]);
        packet.serialize_into(frame.as_mut())?;
        patch_header(frame.as_mut(), self.settings.max_packet_size)?;
        Ok(frame)
    }

    /// Hand queued frames to the transport while nothing is in flight.
    fn flush(&self, inner: &mut Inner) -> Result<()> {
        while inner.state == ConnectionState::Connected
            && inner.active
            && !inner.send_state.is_in_flight()
        {
            let Some(frame) = inner.send_queue.pop_front() else {
                break;
            };
            inner.send_state.begin(frame.len());
            match inner.transport.send_bytes(frame) {
                Ok(SendProgress::Completed) => self.complete_send(inner),
                Ok(SendProgress::InFlight) => {}
                Err(err) => {
                    inner.send_state.reset();
                    inner.active = false;
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn complete_send(&self, inner: &mut Inner) {
        let length = inner.send_state.finish();
        inner.sent_packets += 1;
        global_metrics().packet_sent(length as u64);
        trace!(channel = %self.name, bytes = length, sent = inner.sent_packets, "packet sent");
    }

    /// Returns `false` when the channel was already disconnected.
    fn close_locked(&self, inner: &mut Inner) -> bool {
        if inner.state == ConnectionState::Disconnected {
            return false;
        }
        if inner.state == ConnectionState::Connected {
            global_metrics().channel_closed();
        }

        inner.session = inner.session.wrapping_add(1);
        inner.transport.close();
        inner.state = ConnectionState::Disconnected;
        inner.active = false;
        inner.pending_connect = None;
        inner.send_state.reset();
        inner.send_queue.clear();
        inner.receive_state.reset();
        inner.deferred.push_back(Deferred::Closed);
        true
    }

    /// Queue an error for the observers.
    fn raise(&self, inner: &mut Inner, event: ChannelErrorEvent) {
        warn!(channel = %self.name, error = %event, "channel error");
        inner.deferred.push_back(Deferred::Error(event));
    }

    /// Queue an error, or hand it back when nobody is listening.
    fn report(&self, inner: &mut Inner, event: ChannelErrorEvent) -> Result<()> {
        if self.has_error_observer() {
            self.raise(inner, event);
            Ok(())
        } else {
            error!(channel = %self.name, error = %event, "unobserved channel error");
            Err(event.into_error())
        }
    }

    /// Run deferred work outside the state lock.
    ///
    /// A nested call (an observer calling `close`) or a concurrent one finds the
    /// dispatch lock taken and returns; the holder picks up whatever it queued.
    fn dispatch(&self) {
        loop {
            let guard = match self.dispatch_lock.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };

            while let Some(item) = self.next_deferred() {
                self.run(item);
            }

            drop(guard);
            if self.lock().deferred.is_empty() {
                return;
            }
        }
    }

    fn next_deferred(&self) -> Option<Deferred> {
        let mut inner = self.lock();
        loop {
            match inner.deferred.pop_front()? {
                Deferred::Heartbeat { session } if session != inner.session => {}
                Deferred::Packet { session, body } if session != inner.session => {
                    global_metrics().stale_completion();
                    trace!(
                        channel = %self.name,
                        bytes = body.len(),
                        "packet from closed session dropped"
                    );
                }
                item => return Some(item),
            }
        }
    }

    fn run(&self, item: Deferred) {
        match item {
            Deferred::Connected(user_data) => {
                let observers = self.observers().connected.clone();
                for observer in observers {
                    observer(self, user_data.as_ref());
                }
            }
            Deferred::Error(event) => {
                let observers = self.observers().error.clone();
                if observers.is_empty() {
                    warn!(channel = %self.name, error = %event, "error raised with no observer");
                }
                for observer in observers {
                    observer(self, &event);
                }
            }
            Deferred::MissedHeartbeat(count) => {
                let observers = self.observers().missed_heartbeat.clone();
                for observer in observers {
                    observer(self, count);
                }
            }
            Deferred::Closed => {
                let observers = self.observers().closed.clone();
                for observer in observers {
                    observer(self);
                }
            }
            Deferred::Heartbeat { .. } => {
                if let Some(body) = self.helper.send_heartbeat() {
                    if let Err(err) = self.send(&body[..]) {
                        warn!(channel = %self.name, error = %err, "heartbeat not sent");
                    }
                }
            }
            Deferred::Packet { session, body } => {
                if let Err(err) = self.helper.dispatch(self, body) {
                    let code = match err.code() {
                        NetworkErrorCode::DeserializePacketError => {
                            NetworkErrorCode::DeserializePacketError
                        }
                        _ => NetworkErrorCode::ReceiveError,
                    };
                    let mut inner = self.lock();
                    if inner.session != session {
                        debug!(
                            channel = %self.name,
                            error = %err,
                            "dispatch failure after close ignored"
                        );
                        return;
                    }
                    inner.active = false;
                    self.raise(&mut inner, ChannelErrorEvent::from_error(code, &err));
                    if code.is_fatal() {
                        self.close_locked(&mut inner);
                    }
                }
            }
        }
    }

    fn ensure_disconnected(inner: &Inner) -> Result<()> {
        if inner.state == ConnectionState::Disconnected {
            Ok(())
        } else {
            Err(ChannelError::InvalidState {
                expected: ConnectionState::Disconnected.as_str(),
                actual: inner.state.as_str(),
            })
        }
    }

    fn has_error_observer(&self) -> bool {
        !self.observers().error.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observers(&self) -> std::sync::RwLockReadGuard<'_, Observers> {
        self.observers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn observers_mut(&self) -> std::sync::RwLockWriteGuard<'_, Observers> {
        self.observers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for NetworkChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("NetworkChannel")
            .field("name", &self.name)
            .field("service_type", &self.service_type)
            .field("state", &inner.state)
            .field("active", &inner.active)
            .field("sent_packets", &inner.sent_packets)
            .field("received_packets", &inner.received_packets)
            .finish()
    }
}
