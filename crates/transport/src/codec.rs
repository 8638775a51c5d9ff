//! Envelope encoding for the wire.
//!
//! # Wire Format
//!
//! Every frame is length-prefixed:
//!
//! ```text
//! [u32 BE body length][body]
//! ```
//!
//! A 1-byte body is a listener command (`q` shuts the listener down). Any
//! longer body is an envelope followed by the packed payload:
//!
//! ```text
//! [entity kind u32][entity number u64][service u32][delay u64][time u64][payload ..]
//! ```
//!
//! All integers are big-endian. The payload runs to the end of the frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use pdes_core::{EventInfo, Payload, PayloadError};
use pdes_types::{EntityId, ServiceAddress, VirtualTime};
use thiserror::Error;

/// Bytes in the length prefix.
pub const LENGTH_PREFIX: usize = 4;

/// Bytes in the fixed envelope header.
pub const ENVELOPE_HEADER: usize = 4 + 8 + 4 + 8 + 8;

/// Largest body a frame may carry.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Listener command that ends the receive loop.
pub const SHUTDOWN: u8 = b'q';

/// Errors that can occur during envelope encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Envelope truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Invalid entity kind {0:#x}")]
    InvalidEntityKind(u32),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("Frame body of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),
}

/// Append the envelope header and packed payload to `buf`.
pub fn encode_envelope<P: Payload>(event: &EventInfo<P>, buf: &mut BytesMut) {
    buf.reserve(ENVELOPE_HEADER);
    buf.put_u32(u32::from(event.entity.kind));
    buf.put_u64(event.entity.number);
    buf.put_u32(event.service.0);
    buf.put_u64(event.delay.ticks());
    buf.put_u64(event.time.ticks());
    event.payload.pack(buf);
}

/// Decode an envelope body.
pub fn decode_envelope<P: Payload>(body: &[u8]) -> Result<EventInfo<P>, CodecError> {
    if body.len() < ENVELOPE_HEADER {
        return Err(CodecError::Truncated {
            needed: ENVELOPE_HEADER,
            available: body.len(),
        });
    }
    let mut buf = Bytes::copy_from_slice(body);
    let raw_kind = buf.get_u32();
    let kind = char::from_u32(raw_kind).ok_or(CodecError::InvalidEntityKind(raw_kind))?;
    let number = buf.get_u64();
    let service = ServiceAddress(buf.get_u32());
    let delay = VirtualTime(buf.get_u64());
    let time = VirtualTime(buf.get_u64());
    let payload = P::unpack(&mut buf)?;

    let mut event = EventInfo::new(EntityId::new(kind, number), service, delay, payload);
    event.time = time;
    Ok(event)
}

/// Encode a complete length-prefixed envelope frame.
pub fn encode_frame<P: Payload>(event: &EventInfo<P>) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX + ENVELOPE_HEADER + 32);
    buf.put_u32(0);
    encode_envelope(event, &mut buf);

    let body_len = buf.len() - LENGTH_PREFIX;
    if body_len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(body_len));
    }
    buf[..LENGTH_PREFIX].copy_from_slice(&(body_len as u32).to_be_bytes());
    Ok(buf.freeze())
}

/// A 1-byte command frame.
pub fn command_frame(command: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX + 1);
    buf.put_u32(1);
    buf.put_u8(command);
    buf.freeze()
}
