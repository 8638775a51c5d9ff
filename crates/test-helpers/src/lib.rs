//! Shared fixtures for PDES tests.
//!
//! - [`ReferenceModel`]: a brute-force multiset that event lists are checked
//!   against.
//! - [`TestPayload`]: a small payload with a real wire encoding.
//! - [`RecordingDelivery`]: a delivery that logs every executed event and can
//!   forward events around a ring of entities.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use pdes_core::{require, Delivery, DeliveryError, EventInfo, Payload, PayloadError, SimContext};
use pdes_types::{EntityId, LpId, ServiceAddress, Timestamp, VirtualTime};
use std::cmp::Ordering;
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════
// Reference model
// ═══════════════════════════════════════════════════════════════════════════

/// Unordered multiset of `(id, timestamp)` with linear-time queries.
#[derive(Debug, Clone)]
pub struct ReferenceModel<T> {
    entries: Vec<(u64, T)>,
}

impl<T: Timestamp> Default for ReferenceModel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Timestamp> ReferenceModel<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, id: u64, timestamp: T) {
        self.entries.push((id, timestamp));
    }

    /// Remove `id`, returning its timestamp.
    pub fn remove(&mut self, id: u64) -> Option<T> {
        let index = self.entries.iter().position(|(entry, _)| *entry == id)?;
        Some(self.entries.swap_remove(index).1)
    }

    pub fn adjust(&mut self, id: u64, timestamp: T) -> bool {
        match self.entries.iter_mut().find(|(entry, _)| *entry == id) {
            Some(entry) => {
                entry.1 = timestamp;
                true
            }
            None => false,
        }
    }

    pub fn min(&self) -> Option<T> {
        self.entries
            .iter()
            .map(|(_, t)| *t)
            .min_by(|a, b| a.cmp_time(b))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == id)
    }

    /// Timestamps in ascending order.
    pub fn sorted(&self) -> Vec<T> {
        let mut times: Vec<T> = self.entries.iter().map(|(_, t)| *t).collect();
        times.sort_by(|a, b| a.cmp_time(b));
        times
    }

    /// How many entries sort strictly before `timestamp`.
    pub fn rank(&self, timestamp: T) -> usize {
        self.entries
            .iter()
            .filter(|(_, t)| t.cmp_time(&timestamp) == Ordering::Less)
            .count()
    }

    /// Any id currently present, picked by `index` modulo the size.
    pub fn pick(&self, index: usize) -> Option<u64> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.entries[index % self.entries.len()].0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Test payload
// ═══════════════════════════════════════════════════════════════════════════

/// Payload tagged with a sequence number and a remaining hop count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPayload {
    pub seq: u64,
    pub hops: u32,
}

impl TestPayload {
    pub fn new(seq: u64, hops: u32) -> Self {
        Self { seq, hops }
    }
}

impl Payload for TestPayload {
    fn pack(&self, buf: &mut BytesMut) {
        buf.put_u64(self.seq);
        buf.put_u32(self.hops);
    }

    fn unpack(buf: &mut Bytes) -> Result<Self, PayloadError> {
        require(buf, 12)?;
        Ok(Self {
            seq: buf.get_u64(),
            hops: buf.get_u32(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Recording delivery
// ═══════════════════════════════════════════════════════════════════════════

/// Service that forwards the payload to the next entity in the ring.
pub const FORWARD: ServiceAddress = ServiceAddress(1);

/// Service that only records.
pub const SINK: ServiceAddress = ServiceAddress(2);

/// One executed event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Delivered {
    pub time: VirtualTime,
    pub entity: EntityId,
    pub seq: u64,
    pub lp: LpId,
}

/// Shared log of executed events.
pub type DeliveryLog = Arc<Mutex<Vec<Delivered>>>;

/// Delivery over a ring of `population` entities of kind `'n'`.
///
/// On [`FORWARD`], an event with hops left is sent to the next entity in the
/// ring after `delay` ticks. Entities outside the ring are reported as
/// missing.
#[derive(Debug, Clone)]
pub struct RecordingDelivery {
    population: u64,
    delay: VirtualTime,
    log: DeliveryLog,
}

impl RecordingDelivery {
    pub fn new(population: u64, delay: VirtualTime) -> Self {
        Self::with_log(population, delay, DeliveryLog::default())
    }

    /// Share a log with other deliveries, e.g. one per process.
    pub fn with_log(population: u64, delay: VirtualTime, log: DeliveryLog) -> Self {
        Self {
            population,
            delay,
            log,
        }
    }

    pub fn log(&self) -> DeliveryLog {
        Arc::clone(&self.log)
    }

    /// Executed events sorted by time, then entity and sequence.
    pub fn sorted(log: &DeliveryLog) -> Vec<Delivered> {
        let mut events = log.lock().clone();
        events.sort();
        events
    }
}

impl Delivery<TestPayload> for RecordingDelivery {
    fn deliver(
        &mut self,
        ctx: &mut SimContext<'_, TestPayload>,
        event: EventInfo<TestPayload>,
    ) -> Result<(), DeliveryError> {
        if event.entity.kind != 'n' || event.entity.number >= self.population {
            return Err(DeliveryError::EntityNotFound(event.entity));
        }
        if event.service != FORWARD && event.service != SINK {
            return Err(DeliveryError::ServiceNotFound {
                entity: event.entity,
                service: event.service,
            });
        }
        self.log.lock().push(Delivered {
            time: ctx.now(),
            entity: event.entity,
            seq: event.payload.seq,
            lp: ctx.lp_id(),
        });

        if event.service == FORWARD && event.payload.hops > 0 {
            let next = EntityId::new('n', (event.entity.number + 1) % self.population);
            let payload = TestPayload::new(event.payload.seq, event.payload.hops - 1);
            ctx.send(next, FORWARD, self.delay, payload);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_model_tracks_min() {
        let mut model = ReferenceModel::new();
        model.insert(1, 30u64);
        model.insert(2, 10);
        model.insert(3, 20);
        assert_eq!(model.min(), Some(10));
        assert_eq!(model.remove(2), Some(10));
        assert!(model.adjust(1, 5));
        assert_eq!(model.sorted(), vec![5, 20]);
        assert_eq!(model.rank(20), 1);
    }

    #[test]
    fn test_payload_wire_form() {
        let mut buf = BytesMut::new();
        TestPayload::new(9, 3).pack(&mut buf);
        assert_eq!(buf.len(), 12);
        let mut bytes = buf.freeze();
        assert_eq!(
            TestPayload::unpack(&mut bytes).unwrap(),
            TestPayload::new(9, 3)
        );
    }
}
