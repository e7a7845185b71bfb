//! Observability and Metrics
//!
//! Process-wide counters for channel lifecycle, traffic and liveness.
//!
//! Uses atomic counters so completions on any worker can record without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector shared by every channel in the process
#[derive(Debug)]
pub struct ChannelMetrics {
    /// Connect attempts issued
    pub connects_attempted: AtomicU64,
    /// Connect attempts that reached `Connected`
    pub connects_succeeded: AtomicU64,
    /// Connect attempts that failed
    pub connects_failed: AtomicU64,
    /// Channels currently connected
    pub channels_active: AtomicU64,
    /// Packets fully flushed
    pub packets_sent: AtomicU64,
    /// Packets decoded and dispatched
    pub packets_received: AtomicU64,
    /// Frame bytes written, headers included
    pub bytes_sent: AtomicU64,
    /// Raw bytes received
    pub bytes_received: AtomicU64,
    /// Heartbeat intervals elapsed without a receive
    pub heartbeats_missed: AtomicU64,
    /// Channels closed for missing the heartbeat threshold
    pub heartbeat_timeouts: AtomicU64,
    /// Headers rejected by the framing engine
    pub header_violations: AtomicU64,
    /// Completions discarded because their session had ended
    pub stale_completions: AtomicU64,
    start_time: Instant,
}

impl ChannelMetrics {
    pub fn new() -> Self {
        Self {
            connects_attempted: AtomicU64::new(0),
            connects_succeeded: AtomicU64::new(0),
            connects_failed: AtomicU64::new(0),
            channels_active: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            heartbeats_missed: AtomicU64::new(0),
            heartbeat_timeouts: AtomicU64::new(0),
            header_violations: AtomicU64::new(0),
            stale_completions: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connect_attempt(&self) {
        self.connects_attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a channel reaching `Connected`
    pub fn connect_succeeded(&self) {
        self.connects_succeeded.fetch_add(1, Ordering::Relaxed);
        self.channels_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connect_failed(&self) {
        self.connects_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connected channel going away
    pub fn channel_closed(&self) {
        let _ = self
            .channels_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn packet_sent(&self, byte_count: u64) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn packet_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_received(&self, byte_count: u64) {
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn heartbeat_missed(&self) {
        self.heartbeats_missed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn heartbeat_timeout(&self) {
        self.heartbeat_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn header_violation(&self) {
        self.header_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stale_completion(&self) {
        self.stale_completions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connects_attempted: self.connects_attempted.load(Ordering::Relaxed),
            connects_succeeded: self.connects_succeeded.load(Ordering::Relaxed),
            connects_failed: self.connects_failed.load(Ordering::Relaxed),
            channels_active: self.channels_active.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            heartbeats_missed: self.heartbeats_missed.load(Ordering::Relaxed),
            heartbeat_timeouts: self.heartbeat_timeouts.load(Ordering::Relaxed),
            header_violations: self.header_violations.load(Ordering::Relaxed),
            stale_completions: self.stale_completions.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connects_attempted = snapshot.connects_attempted,
            connects_succeeded = snapshot.connects_succeeded,
            connects_failed = snapshot.connects_failed,
            channels_active = snapshot.channels_active,
            packets_sent = snapshot.packets_sent,
            packets_received = snapshot.packets_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            heartbeats_missed = snapshot.heartbeats_missed,
            heartbeat_timeouts = snapshot.heartbeat_timeouts,
            header_violations = snapshot.header_violations,
            stale_completions = snapshot.stale_completions,
            uptime_seconds = snapshot.uptime_seconds,
            "Channel metrics snapshot"
        );
    }
}

impl Default for ChannelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub connects_attempted: u64,
    pub connects_succeeded: u64,
    pub connects_failed: u64,
    pub channels_active: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub heartbeats_missed: u64,
    pub heartbeat_timeouts: u64,
    pub header_violations: u64,
    pub stale_completions: u64,
    pub uptime_seconds: u64,
}

static METRICS: once_cell::sync::Lazy<ChannelMetrics> =
    once_cell::sync::Lazy::new(ChannelMetrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static ChannelMetrics {
    &METRICS
}
