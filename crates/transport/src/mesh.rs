//! In-memory full mesh between processes.
//!
//! Each process gets an [`Inbox`] (read by its listener thread) and an
//! [`Outbox`] holding a sender to every inbox, its own included. Frames on a
//! channel arrive whole and in order, like a stream socket.

use crate::codec::command_frame;
use crate::error::TransportError;
use crate::frame::{ChannelReader, StreamFrameSource};
use crate::in_flight::InFlight;
use bytes::Bytes;
use crossbeam::channel::{unbounded, Receiver, Sender};
use pdes_types::LpId;
use std::sync::Arc;
use tracing::trace;

#[derive(Clone)]
struct Peer {
    tx: Sender<Bytes>,
    in_flight: Arc<InFlight>,
}

/// Receiving side of one process.
pub struct Inbox {
    id: LpId,
    rx: Receiver<Bytes>,
    in_flight: Arc<InFlight>,
}

impl Inbox {
    pub fn id(&self) -> LpId {
        self.id
    }

    /// Counter of envelopes addressed to this process and not yet enqueued.
    pub fn in_flight(&self) -> Arc<InFlight> {
        Arc::clone(&self.in_flight)
    }

    /// Turn the inbox into a frame source for a listener.
    pub fn into_source(self) -> StreamFrameSource<ChannelReader> {
        StreamFrameSource::new(ChannelReader::new(self.rx))
    }
}

/// Sending side of one process.
#[derive(Clone)]
pub struct Outbox {
    from: LpId,
    peers: Vec<Peer>,
}

impl Outbox {
    pub fn owner(&self) -> LpId {
        self.from
    }

    pub fn num_peers(&self) -> usize {
        self.peers.len()
    }

    fn peer(&self, dest: LpId) -> Result<&Peer, TransportError> {
        self.peers
            .get(dest.index())
            .ok_or(TransportError::UnknownPeer(dest))
    }

    /// Send an envelope frame, counting it in flight at the destination.
    pub fn send_envelope(&self, dest: LpId, frame: Bytes) -> Result<(), TransportError> {
        let peer = self.peer(dest)?;
        peer.in_flight.add();
        trace!(from = %self.from, to = %dest, bytes = frame.len(), "Frame sent");
        if peer.tx.send(frame).is_err() {
            peer.in_flight.done();
            return Err(TransportError::PeerDisconnected(dest));
        }
        Ok(())
    }

    /// Send a 1-byte command frame. Commands are not counted in flight.
    pub fn send_command(&self, dest: LpId, command: u8) -> Result<(), TransportError> {
        self.peer(dest)?
            .tx
            .send(command_frame(command))
            .map_err(|_| TransportError::PeerDisconnected(dest))
    }
}

/// Endpoints for one process.
pub struct Endpoint {
    pub inbox: Inbox,
    pub outbox: Outbox,
}

/// Connect `processes` endpoints to each other.
pub fn mesh(processes: u32) -> Vec<Endpoint> {
    let mut inboxes = Vec::with_capacity(processes as usize);
    let mut peers = Vec::with_capacity(processes as usize);
    for id in 0..processes {
        let (tx, rx) = unbounded();
        let in_flight = Arc::new(InFlight::new());
        inboxes.push(Inbox {
            id: LpId(id),
            rx,
            in_flight: Arc::clone(&in_flight),
        });
        peers.push(Peer { tx, in_flight });
    }

    inboxes
        .into_iter()
        .map(|inbox| Endpoint {
            outbox: Outbox {
                from: inbox.id,
                peers: peers.clone(),
            },
            inbox,
        })
        .collect()
}
