//! Handing due events to entities.
//!
//! ```text
//!   runner ──pop──► EventInfo ──► Delivery::deliver(ctx, event)
//!                                      │
//!                                      ├── ctx.now() / ctx.rng()
//!                                      └── ctx.send(..) ──► LP ──► Transport
//! ```
//!
//! A delivery never sees the LP or transport directly; it gets a
//! [`SimContext`] that borrows both for the duration of one event.

use crate::envelope::EventInfo;
use crate::lp::LogicalProcess;
use crate::transport::Transport;
use pdes_eventlist::EventHandle;
use pdes_types::{EntityId, LpId, ServiceAddress, VirtualTime};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Entity {0} not found")]
    EntityNotFound(EntityId),

    #[error("Entity {entity} has no {service}")]
    ServiceNotFound {
        entity: EntityId,
        service: ServiceAddress,
    },

    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

/// What an entity can do while handling one event.
pub struct SimContext<'a, P> {
    lp: &'a mut LogicalProcess,
    transport: &'a mut dyn Transport<P>,
}

impl<'a, P> SimContext<'a, P> {
    pub fn new(lp: &'a mut LogicalProcess, transport: &'a mut dyn Transport<P>) -> Self {
        Self { lp, transport }
    }

    /// The LP executing the event.
    pub fn lp_id(&self) -> LpId {
        self.lp.id()
    }

    pub fn now(&self) -> VirtualTime {
        self.lp.now()
    }

    /// The executing LP's random stream.
    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        self.lp.rng()
    }

    /// Send `payload` to `entity` after `delay` ticks, subject to lookahead.
    pub fn send(
        &mut self,
        entity: EntityId,
        service: ServiceAddress,
        delay: VirtualTime,
        payload: P,
    ) -> Option<EventHandle> {
        self.send_info(EventInfo::new(entity, service, delay, payload))
    }

    /// Send a prepared envelope.
    pub fn send_info(&mut self, event: EventInfo<P>) -> Option<EventHandle> {
        self.lp.send_event_info(&mut *self.transport, event)
    }

    /// Cancel an event this process still holds.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.transport.cancel(handle)
    }
}

/// Executes events on behalf of the entities a process hosts.
///
/// Models implement this once, usually as a match on the service address or
/// on a payload enum.
///
/// # Guarantees
///
/// - Called with events in non-decreasing time order per LP.
/// - `ctx.now()` equals `event.time` for the duration of the call.
///
/// # Errors
///
/// Errors are logged by the runner and the event is dropped. They never stop
/// the run.
pub trait Delivery<P>: Send {
    fn deliver(
        &mut self,
        ctx: &mut SimContext<'_, P>,
        event: EventInfo<P>,
    ) -> Result<(), DeliveryError>;
}

impl<P, D: Delivery<P> + ?Sized> Delivery<P> for Box<D> {
    fn deliver(
        &mut self,
        ctx: &mut SimContext<'_, P>,
        event: EventInfo<P>,
    ) -> Result<(), DeliveryError> {
        (**self).deliver(ctx, event)
    }
}

/// Deliver one event and log any failure.
///
/// Returns `true` if the entity accepted the event.
pub fn deliver_logged<P, D>(
    delivery: &mut D,
    ctx: &mut SimContext<'_, P>,
    event: EventInfo<P>,
) -> bool
where
    D: Delivery<P> + ?Sized,
{
    let entity = event.entity;
    let service = event.service;
    let time = event.time;
    match delivery.deliver(ctx, event) {
        Ok(()) => true,
        Err(DeliveryError::EntityNotFound(_)) => {
            error!(lp = %ctx.lp_id(), %entity, %time, "Dropping event for unknown entity");
            false
        }
        Err(e) => {
            warn!(lp = %ctx.lp_id(), %entity, %service, %time, error = %e, "Delivery failed");
            false
        }
    }
}
