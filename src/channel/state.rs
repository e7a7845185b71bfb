//! Per-attempt and per-packet bookkeeping owned by a channel.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::transport::Endpoint;

/// Opaque caller data carried from `connect` to the connected event.
pub type UserData = Arc<dyn Any + Send + Sync>;

/// One connect attempt, alive from `connect` until the transport opens or fails.
pub struct ConnectState {
    session: u64,
    endpoint: Endpoint,
    user_data: Option<UserData>,
}

impl ConnectState {
    pub fn new(session: u64, endpoint: Endpoint, user_data: Option<UserData>) -> Self {
        Self {
            session,
            endpoint,
            user_data,
        }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn into_user_data(self) -> Option<UserData> {
        self.user_data
    }
}

impl fmt::Debug for ConnectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectState")
            .field("session", &self.session)
            .field("endpoint", &self.endpoint)
            .field("has_user_data", &self.user_data.is_some())
            .finish()
    }
}

/// The frame currently being flushed.
///
/// The bytes themselves travel with the transport as a pooled buffer; this only
/// records that a write is outstanding and how long it is.
#[derive(Debug, Default, Clone, Copy)]
pub struct SendState {
    length: usize,
    in_flight: bool,
}

impl SendState {
    pub fn begin(&mut self, length: usize) {
        self.length = length;
        self.in_flight = true;
    }

    /// Mark the write done and return its length.
    pub fn finish(&mut self) -> usize {
        let length = self.length;
        self.reset();
        length
    }

    pub fn reset(&mut self) {
        self.length = 0;
        self.in_flight = false;
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn length(&self) -> usize {
        self.length
    }
}
