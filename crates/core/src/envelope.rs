//! Event envelopes and the payload serialization contract.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use pdes_types::{EntityId, ServiceAddress, VirtualTime};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while unpacking a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("Payload truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Invalid payload: {0}")]
    Invalid(String),
}

/// A message body carried between entities.
///
/// The kernel never interprets payloads. It only asks them to pack
/// themselves into bytes when they cross a process boundary and to unpack on
/// the far side. Models usually implement this on an enum of their message
/// kinds.
pub trait Payload: Send + Sync + Sized + 'static {
    /// Append this payload's bytes to `buf`.
    fn pack(&self, buf: &mut BytesMut);

    /// Read a payload from the front of `buf`, consuming what it uses.
    fn unpack(buf: &mut Bytes) -> Result<Self, PayloadError>;
}

/// Ensure `buf` holds at least `needed` more bytes.
pub fn require(buf: &Bytes, needed: usize) -> Result<(), PayloadError> {
    if buf.remaining() < needed {
        return Err(PayloadError::Truncated {
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

impl Payload for () {
    fn pack(&self, _buf: &mut BytesMut) {}

    fn unpack(_buf: &mut Bytes) -> Result<Self, PayloadError> {
        Ok(())
    }
}

/// Raw bytes travel as-is and take whatever is left of the frame.
impl Payload for Bytes {
    fn pack(&self, buf: &mut BytesMut) {
        buf.put_slice(self);
    }

    fn unpack(buf: &mut Bytes) -> Result<Self, PayloadError> {
        Ok(buf.split_to(buf.len()))
    }
}

impl Payload for u64 {
    fn pack(&self, buf: &mut BytesMut) {
        buf.put_u64(*self);
    }

    fn unpack(buf: &mut Bytes) -> Result<Self, PayloadError> {
        require(buf, 8)?;
        Ok(buf.get_u64())
    }
}

/// Routing and timing metadata wrapped around a shared payload.
///
/// Cloning copies the envelope fields and shares the payload.
pub struct EventInfo<P> {
    /// Destination entity.
    pub entity: EntityId,
    /// Service on the destination entity.
    pub service: ServiceAddress,
    /// Requested delay, after lookahead clamping once sent.
    pub delay: VirtualTime,
    /// Absolute execution time, stamped when sent.
    pub time: VirtualTime,
    pub payload: Arc<P>,
}

impl<P> EventInfo<P> {
    /// Create an unsent envelope.
    pub fn new(entity: EntityId, service: ServiceAddress, delay: VirtualTime, payload: P) -> Self {
        Self::shared(entity, service, delay, Arc::new(payload))
    }

    /// Create an unsent envelope around an already shared payload.
    pub fn shared(
        entity: EntityId,
        service: ServiceAddress,
        delay: VirtualTime,
        payload: Arc<P>,
    ) -> Self {
        Self {
            entity,
            service,
            delay,
            time: VirtualTime::ZERO,
            payload,
        }
    }
}

impl<P> Clone for EventInfo<P> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity,
            service: self.service,
            delay: self.delay,
            time: self.time,
            payload: Arc::clone(&self.payload),
        }
    }
}

impl<P> fmt::Debug for EventInfo<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventInfo")
            .field("entity", &self.entity)
            .field("service", &self.service)
            .field("delay", &self.delay)
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_payload() {
        let info = EventInfo::new(
            EntityId::new('n', 1),
            ServiceAddress(1000),
            VirtualTime(3),
            vec![1u8, 2, 3],
        );
        let mut copy = info.clone();
        copy.time = VirtualTime(9);

        assert!(Arc::ptr_eq(&info.payload, &copy.payload));
        assert_eq!(info.time, VirtualTime::ZERO);
        assert_eq!(Arc::strong_count(&info.payload), 2);
    }

    #[test]
    fn test_u64_payload_reports_truncation() {
        let mut buf = Bytes::from_static(&[0, 1, 2]);
        assert_eq!(
            u64::unpack(&mut buf),
            Err(PayloadError::Truncated {
                needed: 8,
                available: 3
            })
        );
    }

    #[test]
    fn test_bytes_payload_takes_rest() {
        let mut packed = BytesMut::new();
        Bytes::from_static(b"opaque").pack(&mut packed);
        let mut frozen = packed.freeze();
        assert_eq!(
            Bytes::unpack(&mut frozen).unwrap(),
            Bytes::from_static(b"opaque")
        );
        assert!(frozen.is_empty());
    }
}
