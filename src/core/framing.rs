//! # Packet Framing
//!
//! Length-prefixed framing over a byte stream.
//!
//! ## Wire Format
//! ```text
//! [Length(4, big-endian u32)] [Body(Length)]
//! ```
//!
//! `Length` must satisfy `0 <= Length <= max_packet_size`. A header outside that
//! range means the stream is desynchronized; the caller must close the channel.
//!
//! [`ReceiveState`] accumulates bytes as they arrive (in any chunking) and yields
//! bodies in order. A parsed header stays pending until its body has been consumed.

use bytes::{Buf, BufMut, BytesMut};

use crate::config::PACKET_HEADER_LENGTH;
use crate::error::{ChannelError, Result};

/// Parsed length prefix of one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    length: u32,
}

impl PacketHeader {
    /// Validate a raw length prefix against `max_packet_size`.
    pub fn new(length: u32, max_packet_size: usize) -> Result<Self> {
        let header = Self { length };
        if header.is_valid(max_packet_size) {
            Ok(header)
        } else {
            Err(ChannelError::PacketHeaderInvalid(length))
        }
    }

    /// Declared body length.
    pub fn packet_length(&self) -> usize {
        self.length as usize
    }

    /// Values above `i32::MAX` are negative lengths for signed peers.
    pub fn is_valid(&self, max_packet_size: usize) -> bool {
        self.length <= i32::MAX as u32 && self.packet_length() <= max_packet_size
    }
}

/// Try to read a header from the front of `src` without consuming it.
///
/// `Ok(None)` means fewer than [`PACKET_HEADER_LENGTH`] bytes are buffered.
pub fn peek_header(src: &[u8], max_packet_size: usize) -> Result<Option<PacketHeader>> {
    if src.len() < PACKET_HEADER_LENGTH {
        return Ok(None);
    }
    let mut raw = [0u8; PACKET_HEADER_LENGTH];
    raw.copy_from_slice(&src[..PACKET_HEADER_LENGTH]);
    PacketHeader::new(u32::from_be_bytes(raw), max_packet_size).map(Some)
}

/// Append `[len(body)][body]` to `dst`.
pub fn encode_frame(body: &[u8], max_packet_size: usize, dst: &mut BytesMut) -> Result<()> {
    if body.len() > max_packet_size {
        return Err(ChannelError::OversizedPacket(body.len()));
    }
    dst.reserve(PACKET_HEADER_LENGTH + body.len());
    dst.put_u32(body.len() as u32);
    dst.put_slice(body);
    Ok(())
}

/// Write the length prefix in place over the first four bytes of a frame
/// whose body was serialized after a placeholder header.
pub fn patch_header(frame: &mut [u8], max_packet_size: usize) -> Result<()> {
    let body_len = frame
        .len()
        .checked_sub(PACKET_HEADER_LENGTH)
        .ok_or_else(|| ChannelError::Custom("frame shorter than its header".to_string()))?;
    if body_len > max_packet_size {
        return Err(ChannelError::OversizedPacket(body_len));
    }
    frame[..PACKET_HEADER_LENGTH].copy_from_slice(&(body_len as u32).to_be_bytes());
    Ok(())
}

/// Inbound buffer plus the header currently awaiting its body.
#[derive(Debug)]
pub struct ReceiveState {
    buffer: BytesMut,
    header: Option<PacketHeader>,
    max_packet_size: usize,
}

impl ReceiveState {
    pub fn new(capacity: usize, max_packet_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            header: None,
            max_packet_size,
        }
    }

    /// Append freshly received bytes.
    pub fn fill(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Parse a header if none is pending.
    ///
    /// Returns the pending header, `Ok(None)` when more bytes are needed, or
    /// `PacketHeaderInvalid` when the declared length is out of bounds. On error the
    /// buffered bytes are left untouched and nothing is dispatched.
    pub fn process_packet_header(&mut self) -> Result<Option<PacketHeader>> {
        if let Some(header) = self.header {
            return Ok(Some(header));
        }
        let Some(header) = peek_header(&self.buffer, self.max_packet_size)? else {
            return Ok(None);
        };
        self.buffer.advance(PACKET_HEADER_LENGTH);
        self.buffer.reserve(header.packet_length());
        self.header = Some(header);
        Ok(Some(header))
    }

    /// Extract the body of the pending header once it is fully buffered.
    pub fn process_packet(&mut self) -> Option<BytesMut> {
        let header = self.header?;
        if self.buffer.len() < header.packet_length() {
            return None;
        }
        self.header = None;
        Some(self.buffer.split_to(header.packet_length()))
    }

    /// Header then body, as one step. `Ok(None)` means more bytes are needed.
    pub fn next_packet(&mut self) -> Result<Option<BytesMut>> {
        match self.process_packet_header()? {
            Some(_) => Ok(self.process_packet()),
            None => Ok(None),
        }
    }

    pub fn pending_header(&self) -> Option<PacketHeader> {
        self.header
    }

    /// Bytes buffered past the pending header.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.header = None;
    }
}
