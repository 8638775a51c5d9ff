use crate::codec::CodecError;
use pdes_types::LpId;
use std::io;
use thiserror::Error;

/// Errors from the cross-process transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A length prefix of zero or above the frame limit. Everything after it
    /// on the stream is unreadable.
    #[error("Malformed frame length {0}")]
    MalformedLength(u32),

    #[error("Frame truncated: expected {expected} bytes, received {received}")]
    TruncatedFrame { expected: usize, received: usize },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Unknown peer {0}")]
    UnknownPeer(LpId),

    #[error("Peer {0} disconnected")]
    PeerDisconnected(LpId),

    #[error("Listener stopped with {pending} frames still in flight")]
    ListenerStopped { pending: u64 },

    #[error("Epoch synchronization aborted by another process")]
    ReducerAborted,
}
