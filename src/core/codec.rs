//! Tokio codec for the channel wire format.
//!
//! Lets peers (servers, test harnesses, proxies) read and write the same
//! `[length][body]` frames a [`NetworkChannel`](crate::channel::NetworkChannel)
//! produces, using `tokio_util::codec::Framed`.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::{DEFAULT_MAX_PACKET_SIZE, PACKET_HEADER_LENGTH};
use crate::core::framing::{encode_frame, peek_header, PacketHeader};
use crate::error::{ChannelError, Result};

#[derive(Debug, Clone)]
pub struct PacketCodec {
    max_packet_size: usize,
    pending: Option<PacketHeader>,
}

impl PacketCodec {
    pub fn new(max_packet_size: usize) -> Self {
        Self {
            max_packet_size,
            pending: None,
        }
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PACKET_SIZE)
    }
}

impl Decoder for PacketCodec {
    type Item = BytesMut;
    type Error = ChannelError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>> {
        let header = match self.pending {
            Some(header) => header,
            None => match peek_header(src, self.max_packet_size)? {
                Some(header) => {
                    src.advance(PACKET_HEADER_LENGTH);
                    self.pending = Some(header);
                    header
                }
                None => return Ok(None),
            },
        };

        if src.len() < header.packet_length() {
            src.reserve(header.packet_length() - src.len());
            return Ok(None);
        }

        self.pending = None;
        Ok(Some(src.split_to(header.packet_length())))
    }
}

impl Encoder<Bytes> for PacketCodec {
    type Error = ChannelError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        encode_frame(&item, self.max_packet_size, dst)
    }
}

impl Encoder<&[u8]> for PacketCodec {
    type Error = ChannelError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<()> {
        encode_frame(item, self.max_packet_size, dst)
    }
}

impl Encoder<Vec<u8>> for PacketCodec {
    type Error = ChannelError;

    fn encode(&mut self, item: Vec<u8>, dst: &mut BytesMut) -> Result<()> {
        encode_frame(&item, self.max_packet_size, dst)
    }
}
