//! The PHOLD benchmark model.
//!
//! A fixed population of entities passes messages around. Every receipt
//! forwards one message to a uniformly random entity after
//! `min_delay + Exp(mean_delay)` ticks, so the event population stays
//! constant and the load is spread evenly across LPs.

use crate::config::PholdConfig;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use hdrhistogram::Histogram;
use pdes_core::{require, Delivery, DeliveryError, EventInfo, Payload, PayloadError, SimContext};
use pdes_types::{EntityId, ServiceAddress, VirtualTime};
use rand::Rng;
use tracing::trace;

/// Entity kind of every PHOLD node.
pub const NODE_KIND: char = 'n';

/// The one service every node installs.
pub const RECEIVER: ServiceAddress = ServiceAddress(1000);

/// A PHOLD message: how many times it has been forwarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PholdMessage {
    pub hops: u64,
}

impl Payload for PholdMessage {
    fn pack(&self, buf: &mut BytesMut) {
        buf.put_u64(self.hops);
    }

    fn unpack(buf: &mut Bytes) -> Result<Self, PayloadError> {
        require(buf, 8)?;
        Ok(Self {
            hops: buf.get_u64(),
        })
    }
}

/// PHOLD node behavior for one process.
///
/// Also records every requested forwarding delay, so the run can report the
/// delay distribution the workload actually produced.
#[derive(Debug, Clone)]
pub struct PholdDelivery {
    population: u64,
    min_delay: VirtualTime,
    mean_delay: f64,
    received: u64,
    delays: Histogram<u64>,
}

impl PholdDelivery {
    pub fn new(config: &PholdConfig, min_delay: VirtualTime) -> Self {
        Self {
            population: config.entities.max(1),
            min_delay,
            mean_delay: config.mean_delay.max(0.0),
            received: 0,
            // Auto-resizing with three significant figures never fails.
            delays: Histogram::new(3).unwrap_or_else(|_| unreachable!("sigfig 3 is in range")),
        }
    }

    /// Messages this process has received.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Requested forwarding delays, in ticks.
    pub fn delays(&self) -> &Histogram<u64> {
        &self.delays
    }

    #[cfg(test)]
    pub(crate) fn record_for_test(&mut self, ticks: u64) {
        self.delays.saturating_record(ticks);
    }

    fn owns(&self, entity: EntityId) -> bool {
        entity.kind == NODE_KIND && entity.number < self.population
    }

    fn sample_delay(&self, rng: &mut impl Rng) -> VirtualTime {
        // Inverse transform on (0, 1]; ln(1) = 0 keeps the delay at the floor.
        let uniform: f64 = 1.0 - rng.gen::<f64>();
        let exponential = -uniform.ln() * self.mean_delay;
        self.min_delay.saturating_add(VirtualTime(exponential as u64))
    }
}

impl Delivery<PholdMessage> for PholdDelivery {
    fn deliver(
        &mut self,
        ctx: &mut SimContext<'_, PholdMessage>,
        event: EventInfo<PholdMessage>,
    ) -> Result<(), DeliveryError> {
        if !self.owns(event.entity) {
            return Err(DeliveryError::EntityNotFound(event.entity));
        }
        if event.service != RECEIVER {
            return Err(DeliveryError::ServiceNotFound {
                entity: event.entity,
                service: event.service,
            });
        }
        self.received += 1;

        let target = EntityId::new(NODE_KIND, ctx.rng().gen_range(0..self.population));
        let delay = self.sample_delay(ctx.rng());
        self.delays.saturating_record(delay.ticks());
        trace!(from = %event.entity, to = %target, %delay, "Forwarding");

        let message = PholdMessage {
            hops: event.payload.hops + 1,
        };
        ctx.send(target, RECEIVER, delay, message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_message_wire_form() {
        let mut buf = BytesMut::new();
        PholdMessage { hops: 7 }.pack(&mut buf);
        assert_eq!(buf.len(), 8);
        let mut bytes = buf.freeze();
        assert_eq!(
            PholdMessage::unpack(&mut bytes).unwrap(),
            PholdMessage { hops: 7 }
        );
    }

    #[test]
    fn test_truncated_message_rejected() {
        let mut bytes = Bytes::from_static(&[0, 1, 2]);
        assert!(PholdMessage::unpack(&mut bytes).is_err());
    }

    #[test]
    fn test_sampled_delay_respects_floor() {
        let delivery =
            PholdDelivery::new(&PholdConfig::default().with_mean_delay(4.0), VirtualTime(3));
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let samples: Vec<u64> = (0..1_000)
            .map(|_| delivery.sample_delay(&mut rng).ticks())
            .collect();

        assert!(samples.iter().all(|d| *d >= 3));
        assert!(samples.iter().any(|d| *d > 3));
        let mean = samples.iter().sum::<u64>() as f64 / samples.len() as f64;
        // Truncation loses about half a tick on average.
        assert!((5.5..7.5).contains(&mean), "mean {mean}");
    }

    #[test]
    fn test_zero_mean_delay_is_exactly_min_delay() {
        let delivery =
            PholdDelivery::new(&PholdConfig::default().with_mean_delay(0.0), VirtualTime(2));
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..100 {
            assert_eq!(delivery.sample_delay(&mut rng), VirtualTime(2));
        }
    }

    #[test]
    fn test_owns_only_population() {
        let delivery = PholdDelivery::new(&PholdConfig::default().with_entities(4), VirtualTime(1));
        assert!(delivery.owns(EntityId::new('n', 3)));
        assert!(!delivery.owns(EntityId::new('n', 4)));
        assert!(!delivery.owns(EntityId::new('m', 0)));
    }
}
