//! # Packet Serialization
//!
//! Outbound packet bodies and serde-backed helpers.
//!
//! [`OutboundPacket`] is what [`NetworkChannel::send`](crate::channel::NetworkChannel::send)
//! accepts. Raw byte types write themselves verbatim; [`Bincode`] serializes any
//! `Serialize` value with bincode, and [`decode_body`] reverses it on the receive side.
//!
//! ## Usage
//! ```rust
//! use network_channel::core::serialization::{decode_body, Bincode, OutboundPacket};
//!
//! let mut body = Vec::new();
//! Bincode(&(7u32, "move")).serialize_into(&mut body).unwrap();
//! let (id, verb): (u32, String) = decode_body(&body).unwrap();
//! assert_eq!((id, verb.as_str()), (7, "move"));
//! ```

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{ChannelError, NetworkErrorCode, Result};
use crate::utils::buffer_pool::OUTBOUND;

/// A packet that can write its body into a send buffer.
pub trait OutboundPacket {
    /// Pool bucket the serialized frame is drawn from.
    fn kind(&self) -> &'static str {
        OUTBOUND
    }

    /// Append the packet body to `dst`.
    fn serialize_into(&self, dst: &mut Vec<u8>) -> Result<()>;
}

impl OutboundPacket for [u8] {
    fn serialize_into(&self, dst: &mut Vec<u8>) -> Result<()> {
        dst.extend_from_slice(self);
        Ok(())
    }
}

impl OutboundPacket for Vec<u8> {
    fn serialize_into(&self, dst: &mut Vec<u8>) -> Result<()> {
        dst.extend_from_slice(self);
        Ok(())
    }
}

impl OutboundPacket for Bytes {
    fn serialize_into(&self, dst: &mut Vec<u8>) -> Result<()> {
        dst.extend_from_slice(self);
        Ok(())
    }
}

impl OutboundPacket for str {
    fn serialize_into(&self, dst: &mut Vec<u8>) -> Result<()> {
        dst.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

impl<T: OutboundPacket + ?Sized> OutboundPacket for &T {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn serialize_into(&self, dst: &mut Vec<u8>) -> Result<()> {
        (**self).serialize_into(dst)
    }
}

/// Bincode-encoded serde value.
#[derive(Debug, Clone, Copy)]
pub struct Bincode<T>(pub T);

impl<T: Serialize> OutboundPacket for Bincode<T> {
    fn serialize_into(&self, dst: &mut Vec<u8>) -> Result<()> {
        bincode::serialize_into(dst, &self.0)?;
        Ok(())
    }
}

/// Decode a bincode packet body.
///
/// Failures carry [`NetworkErrorCode::DeserializePacketError`], which closes the
/// channel when returned from a packet dispatch.
pub fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    bincode::deserialize(body).map_err(|e| {
        ChannelError::transport(NetworkErrorCode::DeserializePacketError, None, e.to_string())
    })
}
