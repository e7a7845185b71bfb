//! Channel behaviour over the bridge transport, driven entirely by update ticks

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use network_channel::channel::helper::{ChannelHelper, FnHelper};
use network_channel::config::{BridgeConfig, ChannelSettings};
use network_channel::core::serialization::decode_body;
use network_channel::error::constants;
use network_channel::transport::bridge::{
    BridgeCallbacks, BridgeConnection, BridgeFault, BridgeResult, BridgeTransport,
};
use network_channel::{
    ConnectionState, NetworkChannel, NetworkErrorCode, PacketPool, PooledBuffer, ServiceType,
    UserData,
};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const TICK: Duration = Duration::from_millis(10);

enum HostEvent {
    Open,
    Message(Vec<u8>),
    Error(BridgeFault),
    Close,
}

#[derive(Default)]
struct HostState {
    url: Option<String>,
    origin: Option<String>,
    open: bool,
    fail_connect: bool,
    fail_send: bool,
    callbacks: Option<BridgeCallbacks>,
    incoming: VecDeque<HostEvent>,
    sent: Vec<Vec<u8>>,
    closes: usize,
}

/// Host side of the bridge, as a test would script it.
#[derive(Clone, Default)]
struct Host(Arc<Mutex<HostState>>);

impl Host {
    fn state(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.0.lock().unwrap()
    }

    fn open(&self) {
        let mut state = self.state();
        state.open = true;
        state.incoming.push_back(HostEvent::Open);
    }

    fn message(&self, bytes: &[u8]) {
        self.state().incoming.push_back(HostEvent::Message(bytes.to_vec()));
    }

    fn frame(&self, body: &[u8]) {
        let mut bytes = (body.len() as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(body);
        self.message(&bytes);
    }

    fn error(&self, code: i32, message: &str) {
        self.state()
            .incoming
            .push_back(HostEvent::Error(BridgeFault::with_code(code, message)));
    }

    /// Close callback from a socket the channel already closed.
    fn late_close(&self) {
        self.state().incoming.push_back(HostEvent::Close);
    }

    fn peer_close(&self) {
        let mut state = self.state();
        state.open = false;
        state.incoming.push_back(HostEvent::Close);
    }

    /// Bodies of every frame the channel wrote.
    fn sent_bodies(&self) -> Vec<Vec<u8>> {
        self.state()
            .sent
            .iter()
            .map(|frame| {
                let len = u32::from_be_bytes(frame[..4].try_into().unwrap()) as usize;
                assert_eq!(frame.len(), 4 + len);
                frame[4..].to_vec()
            })
            .collect()
    }
}

impl BridgeConnection for Host {
    fn initialize(&mut self, url: &str, origin: Option<&str>) -> BridgeResult<()> {
        let mut state = self.state();
        state.url = Some(url.to_string());
        state.origin = origin.map(str::to_string);
        Ok(())
    }

    fn connect(&mut self) -> BridgeResult<()> {
        if self.state().fail_connect {
            return Err(BridgeFault::with_code(10061, "connection refused"));
        }
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> BridgeResult<()> {
        let mut state = self.state();
        if state.fail_send {
            return Err(BridgeFault::with_code(1006, "abnormal closure"));
        }
        state.sent.push(bytes.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state();
        state.open = false;
        state.closes += 1;
    }

    fn is_open(&self) -> bool {
        self.state().open
    }

    fn dispatch_message_queue(&mut self) {
        let (callbacks, events) = {
            let mut state = self.state();
            let Some(callbacks) = state.callbacks.clone() else {
                return;
            };
            (callbacks, state.incoming.drain(..).collect::<Vec<_>>())
        };
        for event in events {
            match event {
                HostEvent::Open => (callbacks.on_open)(()),
                HostEvent::Message(bytes) => (callbacks.on_message)(bytes),
                HostEvent::Error(fault) => (callbacks.on_error)(fault),
                HostEvent::Close => (callbacks.on_close)(()),
            }
        }
    }

    fn subscribe(&mut self, callbacks: BridgeCallbacks) {
        self.state().callbacks = Some(callbacks);
    }
}

type Log = Arc<Mutex<Vec<String>>>;

struct Harness {
    channel: Arc<NetworkChannel>,
    host: Host,
    log: Log,
    received: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Harness {
    fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    fn received(&self) -> Vec<Vec<u8>> {
        self.received.lock().unwrap().clone()
    }

    fn connect(&self) {
        self.channel.connect(LOCALHOST, 9000, None).unwrap();
        self.host.open();
        self.channel.update(TICK);
        assert_eq!(self.channel.state(), ConnectionState::Connected);
    }
}

fn settings() -> ChannelSettings {
    ChannelSettings {
        max_packet_size: 1024,
        heartbeat_interval: Duration::from_millis(100),
        missed_heartbeat_threshold: 3,
        receive_buffer_size: 256,
        ..ChannelSettings::default()
    }
}

fn harness_with(
    settings: ChannelSettings,
    helper: Option<Arc<dyn ChannelHelper>>,
    observe_errors: bool,
) -> Harness {
    let host = Host::default();
    let received = Arc::new(Mutex::new(Vec::new()));
    let helper = helper.unwrap_or_else(|| {
        let sink = received.clone();
        Arc::new(
            FnHelper::from_fn(move |_ch: &NetworkChannel, body: PooledBuffer| {
                sink.lock().unwrap().push(body.to_vec());
                Ok(())
            })
            .with_heartbeat(b"ping".to_vec()),
        )
    });

    let channel = NetworkChannel::new(
        "bridge",
        BridgeTransport::new(host.clone(), BridgeConfig::default()),
        helper,
        PacketPool::default(),
        settings,
    );

    let log: Log = Arc::new(Mutex::new(Vec::new()));
    {
        let log = log.clone();
        channel.on_connected(move |_, data| {
            let tag = data
                .and_then(|d| d.downcast_ref::<&'static str>())
                .copied()
                .unwrap_or("-");
            log.lock().unwrap().push(format!("connected:{tag}"));
        });
    }
    if observe_errors {
        let log = log.clone();
        channel.on_error(move |_, err| {
            log.lock().unwrap().push(format!("error:{}", err.code));
        });
    }
    {
        let log = log.clone();
        channel.on_missed_heartbeat(move |_, count| {
            log.lock().unwrap().push(format!("missed:{count}"));
        });
    }
    {
        let log = log.clone();
        channel.on_closed(move |_| log.lock().unwrap().push("closed".to_string()));
    }

    Harness {
        channel,
        host,
        log,
        received,
    }
}

fn harness() -> Harness {
    harness_with(settings(), None, true)
}

#[test]
fn test_connect_completes_on_update() {
    let h = harness();
    assert_eq!(h.channel.service_type(), ServiceType::WebSocket);

    let data: UserData = Arc::new("lobby");
    h.channel.connect(LOCALHOST, 9000, Some(data)).unwrap();
    assert_eq!(h.channel.state(), ConnectionState::Connecting);
    assert_eq!(h.host.state().url.as_deref(), Some("ws://127.0.0.1:9000/ws"));
    assert!(h.host.state().origin.is_none());

    h.host.open();
    assert!(h.events().is_empty());
    h.channel.update(TICK);

    assert_eq!(h.channel.state(), ConnectionState::Connected);
    assert!(h.channel.is_active());
    assert_eq!(h.events(), vec!["connected:lobby"]);
}

#[test]
fn test_connect_twice_is_rejected() {
    let h = harness();
    h.channel.connect(LOCALHOST, 9000, None).unwrap();
    assert!(h.channel.connect(LOCALHOST, 9000, None).is_err());
    assert_eq!(h.channel.state(), ConnectionState::Connecting);
}

#[test]
fn test_open_signal_ignored_when_host_not_open() {
    let h = harness();
    h.channel.connect(LOCALHOST, 9000, None).unwrap();
    h.host.state().incoming.push_back(HostEvent::Open);
    h.channel.update(TICK);

    assert_eq!(h.channel.state(), ConnectionState::Connecting);
    assert_eq!(h.count("connected"), 0);
}

#[test]
fn test_connect_failure_is_raised_on_next_update() {
    let h = harness();
    h.host.state().fail_connect = true;

    h.channel.connect(LOCALHOST, 9000, None).unwrap();
    assert_eq!(h.channel.state(), ConnectionState::Disconnected);
    assert!(h.events().is_empty());

    h.channel.update(TICK);
    assert_eq!(h.events(), vec!["error:ConnectError"]);
}

#[test]
fn test_connect_failure_without_observer_is_returned() {
    let h = harness_with(settings(), None, false);
    h.host.state().fail_connect = true;

    let err = h.channel.connect(LOCALHOST, 9000, None).unwrap_err();
    assert_eq!(err.code(), NetworkErrorCode::ConnectError);
    assert_eq!(err.transport_code(), Some(10061));
    assert_eq!(h.channel.state(), ConnectionState::Disconnected);
}

#[test]
fn test_host_error_while_connecting_reverts() {
    let h = harness();
    h.channel.connect(LOCALHOST, 9000, None).unwrap();
    h.host.error(10060, "timed out");
    h.channel.update(TICK);

    assert_eq!(h.channel.state(), ConnectionState::Disconnected);
    assert_eq!(h.events(), vec!["error:ConnectError"]);

    h.channel.connect(LOCALHOST, 9000, None).unwrap();
    h.host.open();
    h.channel.update(TICK);
    assert_eq!(h.channel.state(), ConnectionState::Connected);
}

#[test]
fn test_send_writes_frames_in_order() {
    let h = harness();
    h.connect();

    h.channel.send(&b"one"[..]).unwrap();
    h.channel.send("two").unwrap();
    h.channel.send(&vec![3u8; 10]).unwrap();

    assert_eq!(
        h.host.sent_bodies(),
        vec![b"one".to_vec(), b"two".to_vec(), vec![3u8; 10]]
    );
    assert_eq!(h.channel.sent_packet_count(), 3);
    assert_eq!(h.channel.send_queue_len(), 0);
}

#[test]
fn test_send_before_connect() {
    let h = harness();
    h.channel.send(&b"early"[..]).unwrap();
    assert!(h.events().is_empty());
    h.channel.update(TICK);
    assert_eq!(h.events(), vec!["error:SendError"]);

    let quiet = harness_with(settings(), None, false);
    let err = quiet.channel.send(&b"early"[..]).unwrap_err();
    assert_eq!(err.code(), NetworkErrorCode::SendError);
    assert!(err.to_string().ends_with(constants::ERR_NOT_CONNECTED));
}

#[test]
fn test_send_failure_deactivates() {
    let h = harness();
    h.connect();
    h.host.state().fail_send = true;

    h.channel.send(&b"lost"[..]).unwrap();
    assert!(!h.channel.is_active());
    assert_eq!(h.channel.state(), ConnectionState::Connected);
    assert_eq!(h.channel.sent_packet_count(), 0);

    h.channel.update(TICK);
    assert_eq!(h.events(), vec!["connected:-", "error:SendError"]);
}

#[test]
fn test_oversized_packet_is_a_serialize_error() {
    let h = harness();
    h.connect();
    h.channel.send(&vec![0u8; 2048]).unwrap();
    h.channel.update(TICK);
    assert_eq!(h.count("error:SerializeError"), 1);
    assert!(h.host.sent_bodies().is_empty());
}

#[test]
fn test_packets_split_across_messages() {
    let h = harness();
    h.connect();

    let mut wire = Vec::new();
    for body in [&b"hello"[..], b"", b"world!"] {
        wire.extend_from_slice(&(body.len() as u32).to_be_bytes());
        wire.extend_from_slice(body);
    }
    h.host.message(&wire[..3]);
    h.host.message(&wire[3..11]);
    h.channel.update(TICK);
    assert_eq!(h.received(), vec![b"hello".to_vec()]);

    h.host.message(&wire[11..]);
    h.channel.update(TICK);
    assert_eq!(
        h.received(),
        vec![b"hello".to_vec(), Vec::new(), b"world!".to_vec()]
    );
    assert_eq!(h.channel.received_packet_count(), 3);
}

#[test]
fn test_invalid_header_closes_without_dispatch() {
    let h = harness();
    h.connect();

    let mut wire = 4096u32.to_be_bytes().to_vec();
    wire.extend_from_slice(&[1u8; 64]);
    h.host.message(&wire);
    h.channel.update(TICK);

    assert!(h.received().is_empty());
    assert_eq!(h.channel.state(), ConnectionState::Disconnected);
    assert_eq!(
        h.events(),
        vec!["connected:-", "error:PacketHeaderInvalid", "closed"]
    );
}

#[test]
fn test_empty_message_closes() {
    let h = harness();
    h.connect();
    h.host.message(&[]);
    h.channel.update(TICK);
    assert_eq!(h.channel.state(), ConnectionState::Disconnected);
    assert_eq!(h.count("closed"), 1);
}

#[test]
fn test_peer_close_raises_closed_once() {
    let h = harness();
    h.connect();
    h.host.peer_close();
    h.channel.update(TICK);
    h.channel.close();
    h.channel.update(TICK);

    assert_eq!(h.channel.state(), ConnectionState::Disconnected);
    assert_eq!(h.count("closed"), 1);
}

#[test]
fn test_close_is_idempotent() {
    let h = harness();
    h.connect();
    h.channel.close();
    h.channel.close();

    assert_eq!(h.channel.state(), ConnectionState::Disconnected);
    assert_eq!(h.count("closed"), 1);
    assert_eq!(h.host.state().closes, 1);
    assert!(!h.channel.is_active());
}

#[test]
fn test_close_from_error_observer() {
    let h = harness();
    let closes = Arc::new(AtomicUsize::new(0));
    {
        let closes = closes.clone();
        h.channel.on_error(move |ch, _| {
            closes.fetch_add(1, Ordering::SeqCst);
            ch.close();
            ch.close();
        });
    }
    h.connect();

    h.host.error(104, "connection reset");
    h.channel.update(TICK);

    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(h.channel.state(), ConnectionState::Disconnected);
    assert_eq!(h.events(), vec!["connected:-", "error:SocketError", "closed"]);
}

#[test]
fn test_host_error_deactivates_but_stays_connected() {
    let h = harness();
    h.connect();
    h.host.error(104, "connection reset");
    h.channel.update(TICK);

    assert_eq!(h.channel.state(), ConnectionState::Connected);
    assert!(!h.channel.is_active());

    h.channel.send(&b"after"[..]).unwrap();
    h.channel.update(TICK);
    assert_eq!(h.count("error:SendError"), 1);
    assert!(h.host.sent_bodies().is_empty());
}

#[test]
fn test_queued_messages_after_close_are_dropped() {
    let h = harness();
    h.connect();
    h.host.frame(b"late");
    h.channel.close();
    h.channel.update(TICK);

    assert!(h.received().is_empty());
    assert_eq!(h.channel.received_packet_count(), 0);
    assert_eq!(h.channel.state(), ConnectionState::Disconnected);
}

#[test]
fn test_late_host_close_does_not_end_reconnect() {
    let h = harness();
    h.connect();
    h.channel.close();
    h.host.late_close();

    h.channel.connect(LOCALHOST, 9000, None).unwrap();
    h.host.open();
    h.channel.update(TICK);

    assert_eq!(h.channel.state(), ConnectionState::Connected);
    assert!(h.channel.is_active());
    assert_eq!(h.events(), vec!["connected:-", "closed", "connected:-"]);

    h.host.peer_close();
    h.channel.update(TICK);
    assert_eq!(h.channel.state(), ConnectionState::Disconnected);
    assert_eq!(h.count("closed"), 2);
}

#[test]
fn test_packets_queued_before_close_are_not_dispatched() {
    let h = harness();
    h.channel.on_connected(|ch, _| ch.close());
    h.channel.connect(LOCALHOST, 9000, None).unwrap();
    h.host.open();
    h.host.frame(b"late");
    h.channel.update(TICK);

    assert_eq!(h.channel.state(), ConnectionState::Disconnected);
    assert_eq!(h.events(), vec!["connected:-", "closed"]);
    assert!(h.received().is_empty());
}

#[test]
fn test_dispatch_failure_after_close_leaves_reconnect_alone() {
    let reconnect = Arc::new(Mutex::new(None::<Arc<NetworkChannel>>));
    let helper: Arc<dyn ChannelHelper> = {
        let reconnect = reconnect.clone();
        Arc::new(FnHelper::from_fn(move |ch: &NetworkChannel, _body: PooledBuffer| {
            ch.close();
            if let Some(channel) = reconnect.lock().unwrap().as_ref() {
                channel.connect(LOCALHOST, 9000, None).unwrap();
            }
            Err(network_channel::ChannelError::Custom("handler gave up".into()))
        }))
    };

    let h = harness_with(settings(), Some(helper), true);
    *reconnect.lock().unwrap() = Some(h.channel.clone());
    h.connect();
    h.host.frame(b"x");
    h.channel.update(TICK);

    assert_eq!(h.channel.state(), ConnectionState::Connecting);
    assert_eq!(h.count("error"), 0);
    assert_eq!(h.events(), vec!["connected:-", "closed"]);

    reconnect.lock().unwrap().take();
    h.host.open();
    h.channel.update(TICK);
    assert_eq!(h.channel.state(), ConnectionState::Connected);
    assert!(h.channel.is_active());
}

#[test]
fn test_missed_heartbeats_send_ping_then_time_out() {
    let h = harness();
    h.connect();

    h.channel.update(Duration::from_millis(100));
    h.channel.update(Duration::from_millis(100));
    assert_eq!(h.channel.missed_heartbeat_count(), 2);
    assert_eq!(h.host.sent_bodies(), vec![b"ping".to_vec(), b"ping".to_vec()]);

    h.channel.update(Duration::from_millis(100));
    h.channel.update(Duration::from_millis(100));

    assert_eq!(
        h.events(),
        vec![
            "connected:-",
            "missed:1",
            "missed:2",
            "error:HeartbeatTimeout",
            "closed"
        ]
    );
    assert_eq!(h.channel.state(), ConnectionState::Disconnected);
}

#[test]
fn test_receive_resets_missed_heartbeats() {
    let h = harness();
    h.connect();

    h.channel.update(Duration::from_millis(100));
    h.channel.update(Duration::from_millis(60));
    assert_eq!(h.channel.missed_heartbeat_count(), 1);

    h.host.frame(b"pong");
    h.channel.update(Duration::ZERO);
    assert_eq!(h.channel.missed_heartbeat_count(), 0);
    assert_eq!(h.channel.heartbeat_elapsed(), Duration::ZERO);

    for _ in 0..2 {
        h.channel.update(Duration::from_millis(100));
    }
    assert_eq!(h.channel.state(), ConnectionState::Connected);
    assert_eq!(h.count("error:HeartbeatTimeout"), 0);
}

#[test]
fn test_receive_can_keep_elapsed_timer() {
    let h = harness_with(
        ChannelSettings {
            reset_heartbeat_elapsed_on_receive: false,
            ..settings()
        },
        None,
        true,
    );
    h.connect();

    h.channel.update(Duration::from_millis(60));
    h.host.frame(b"pong");
    h.channel.update(Duration::ZERO);
    assert_eq!(h.channel.heartbeat_elapsed(), Duration::from_millis(70));

    h.channel.update(Duration::from_millis(40));
    assert_eq!(h.count("missed:1"), 1);
}

#[test]
fn test_zero_interval_disables_heartbeat() {
    let h = harness();
    h.connect();
    h.channel.set_heartbeat_interval(Duration::ZERO);
    for _ in 0..10 {
        h.channel.update(Duration::from_secs(1));
    }
    assert_eq!(h.channel.state(), ConnectionState::Connected);
    assert_eq!(h.channel.missed_heartbeat_count(), 0);
}

#[test]
fn test_dispatch_failure_codes() {
    let helper: Arc<dyn ChannelHelper> =
        Arc::new(FnHelper::from_fn(|_ch: &NetworkChannel, body: PooledBuffer| {
            if body.as_ref() == b"bad" {
                return Err(network_channel::ChannelError::Custom("unhandled packet".into()));
            }
            decode_body::<u32>(&body).map(|_| ())
        }));

    let h = harness_with(settings(), Some(helper.clone()), true);
    h.connect();
    h.host.frame(b"bad");
    h.channel.update(TICK);
    assert_eq!(h.count("error:ReceiveError"), 1);
    assert_eq!(h.channel.state(), ConnectionState::Connected);
    assert!(!h.channel.is_active());

    let h = harness_with(settings(), Some(helper), true);
    h.connect();
    h.host.frame(&[1]);
    h.channel.update(TICK);
    assert_eq!(h.count("error:DeserializePacketError"), 1);
    assert_eq!(h.channel.state(), ConnectionState::Disconnected);
}

#[test]
fn test_observer_may_send_on_connect() {
    let h = harness();
    h.channel.on_connected(|ch, _| {
        ch.send(&b"hello"[..]).unwrap();
    });
    h.connect();
    assert_eq!(h.host.sent_bodies(), vec![b"hello".to_vec()]);
}

#[test]
fn test_reconnect_resets_counters() {
    let h = harness();
    h.connect();
    h.channel.send(&b"x"[..]).unwrap();
    h.host.frame(b"y");
    h.channel.update(TICK);
    assert_eq!(h.channel.sent_packet_count(), 1);
    assert_eq!(h.channel.received_packet_count(), 1);

    h.channel.close();
    h.connect();
    assert_eq!(h.channel.sent_packet_count(), 0);
    assert_eq!(h.channel.received_packet_count(), 0);
}

#[test]
fn test_shutdown_drops_observers() {
    struct Tracking(Arc<AtomicUsize>);

    impl ChannelHelper for Tracking {
        fn dispatch(&self, _: &NetworkChannel, _: PooledBuffer) -> network_channel::Result<()> {
            Ok(())
        }

        fn shutdown(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let shutdowns = Arc::new(AtomicUsize::new(0));
    let h = harness_with(settings(), Some(Arc::new(Tracking(shutdowns.clone()))), true);
    h.connect();
    h.channel.shutdown();

    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(h.count("closed"), 1);

    h.channel.connect(LOCALHOST, 9000, None).unwrap();
    h.host.open();
    h.channel.update(TICK);
    assert_eq!(h.count("connected"), 1);
}
