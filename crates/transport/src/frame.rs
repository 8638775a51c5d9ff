//! Reading length-prefixed frames from a byte stream.

use crate::codec::{LENGTH_PREFIX, MAX_FRAME_LEN};
use crate::error::TransportError;
use bytes::{Buf, Bytes};
use crossbeam::channel::Receiver;
use std::io::{self, Read};
use tracing::trace;

/// One decoded frame, borrowing the source's receive buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    /// A 1-byte listener command.
    Command(u8),
    /// An encoded envelope body.
    Envelope(&'a [u8]),
}

/// Reads frames from any [`Read`], such as a TCP stream or a [`ChannelReader`].
///
/// The receive buffer is reused across frames and grows to the largest
/// frame seen.
pub struct StreamFrameSource<R> {
    reader: R,
    buf: Vec<u8>,
    frames: u64,
}

impl<R: Read> StreamFrameSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, 256)
    }

    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader,
            buf: vec![0; capacity],
            frames: 0,
        }
    }

    /// Frames read so far.
    pub fn frames_read(&self) -> u64 {
        self.frames
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buf.len()
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` on a clean end of stream between frames. A zero or
    /// oversized length, or a stream that ends mid-frame, is an error: the
    /// framing of everything after it is lost.
    pub fn next_frame(&mut self) -> Result<Option<Frame<'_>>, TransportError> {
        let mut prefix = [0u8; LENGTH_PREFIX];
        match read_full(&mut self.reader, &mut prefix)? {
            0 => return Ok(None),
            LENGTH_PREFIX => {}
            received => {
                return Err(TransportError::TruncatedFrame {
                    expected: LENGTH_PREFIX,
                    received,
                })
            }
        }

        let raw_len = u32::from_be_bytes(prefix);
        let len = raw_len as usize;
        if len == 0 || len > MAX_FRAME_LEN {
            return Err(TransportError::MalformedLength(raw_len));
        }
        if len > self.buf.len() {
            trace!(from = self.buf.len(), to = len, "Growing receive buffer");
            self.buf.resize(len, 0);
        }

        let received = read_full(&mut self.reader, &mut self.buf[..len])?;
        if received < len {
            return Err(TransportError::TruncatedFrame {
                expected: len,
                received,
            });
        }
        self.frames += 1;

        if len == 1 {
            Ok(Some(Frame::Command(self.buf[0])))
        } else {
            Ok(Some(Frame::Envelope(&self.buf[..len])))
        }
    }
}

/// Fill `buf` unless the stream ends first; returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Presents a channel of byte chunks as a byte stream.
///
/// The stream ends once every sender is dropped.
pub struct ChannelReader {
    rx: Receiver<Bytes>,
    current: Bytes,
}

impl ChannelReader {
    pub fn new(rx: Receiver<Bytes>) -> Self {
        Self {
            rx,
            current: Bytes::new(),
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        while self.current.is_empty() {
            match self.rx.recv() {
                Ok(chunk) => self.current = chunk,
                Err(_) => return Ok(0),
            }
        }
        let n = out.len().min(self.current.len());
        out[..n].copy_from_slice(&self.current[..n]);
        self.current.advance(n);
        Ok(n)
    }
}
