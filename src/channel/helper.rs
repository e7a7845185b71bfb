//! Boundary to the packet layer that sits on top of a channel.
//!
//! The helper turns decoded bodies into application packets and supplies the
//! heartbeat packet. It is always called outside the channel's internal lock, so
//! it may call [`NetworkChannel::send`] or [`NetworkChannel::close`] freely.

use std::fmt;

use crate::channel::NetworkChannel;
use crate::error::Result;
use crate::utils::buffer_pool::PooledBuffer;

pub trait ChannelHelper: Send + Sync {
    /// Called once per connect attempt, before the transport starts opening.
    fn prepare_for_connecting(&self) {}

    /// Body of the heartbeat packet sent each time an interval elapses without a
    /// receive. `None` sends nothing.
    fn send_heartbeat(&self) -> Option<Vec<u8>> {
        None
    }

    /// Handle one decoded packet body.
    ///
    /// An error whose code is `DeserializePacketError` closes the channel; any
    /// other error deactivates it with `ReceiveError`.
    fn dispatch(&self, channel: &NetworkChannel, body: PooledBuffer) -> Result<()>;

    /// Called from [`NetworkChannel::shutdown`].
    fn shutdown(&self) {}
}

/// Helper built from a dispatch closure.
pub struct FnHelper<F> {
    dispatch: F,
    heartbeat: Option<Vec<u8>>,
}

impl<F> FnHelper<F>
where
    F: Fn(&NetworkChannel, PooledBuffer) -> Result<()> + Send + Sync,
{
    pub fn from_fn(dispatch: F) -> Self {
        Self {
            dispatch,
            heartbeat: None,
        }
    }

    /// Send `body` on every missed heartbeat interval.
    pub fn with_heartbeat(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.heartbeat = Some(body.into());
        self
    }
}

impl<F> ChannelHelper for FnHelper<F>
where
    F: Fn(&NetworkChannel, PooledBuffer) -> Result<()> + Send + Sync,
{
    fn send_heartbeat(&self) -> Option<Vec<u8>> {
        self.heartbeat.clone()
    }

    fn dispatch(&self, channel: &NetworkChannel, body: PooledBuffer) -> Result<()> {
        (self.dispatch)(channel, body)
    }
}

impl<F> fmt::Debug for FnHelper<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHelper")
            .field("heartbeat", &self.heartbeat.as_ref().map(Vec::len))
            .finish()
    }
}
