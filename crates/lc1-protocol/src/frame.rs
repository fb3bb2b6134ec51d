//! Stream demultiplexing
//!
//! The controller never sends a length or a terminator, so frame boundaries
//! can only be found in hindsight: a frame runs from its start marker up to
//! (but excluding) the next start marker. [`FrameDemux`] buffers incoming
//! bytes and hands out a frame only once the marker that follows it has been
//! seen. Whatever follows the last marker is held back as a possibly
//! incomplete tail.

use std::fmt;

use crate::{REQUEST_START, STREAM_START};

/// Longest frame the demultiplexer expects to see
///
/// Replies are 12 bytes and telemetry is 6. A tail that grows past four times
/// this without another marker is line noise and gets discarded.
pub const MAX_FRAME_LEN: usize = 64;

/// Which start marker a frame begins with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameKind {
    /// `0xB2`: unsolicited telemetry
    Stream,
    /// `0xA2`: reply to a command byte
    Request,
}

impl FrameKind {
    /// Classify a byte as a start marker
    pub fn from_marker(byte: u8) -> Option<Self> {
        match byte {
            STREAM_START => Some(Self::Stream),
            REQUEST_START => Some(Self::Request),
            _ => None,
        }
    }

    /// The start marker byte for this kind
    pub fn marker(&self) -> u8 {
        match self {
            Self::Stream => STREAM_START,
            Self::Request => REQUEST_START,
        }
    }
}

/// Returns true if the byte starts a new frame
pub fn is_start_marker(byte: u8) -> bool {
    FrameKind::from_marker(byte).is_some()
}

/// One complete frame, start marker included
#[derive(Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    /// Wrap raw frame bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw bytes of the frame
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the frame, returning its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Number of bytes in the frame
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the frame holds no bytes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Kind of the frame, from its first byte
    pub fn kind(&self) -> Option<FrameKind> {
        self.0.first().copied().and_then(FrameKind::from_marker)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:02X?})", self.0)
    }
}

impl From<Vec<u8>> for Frame {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Streaming frame demultiplexer
///
/// Never blocks and never fails. Bytes before the first marker are dropped,
/// and malformed input yields nothing until a marker resynchronizes it.
#[derive(Debug, Default)]
pub struct FrameDemux {
    buffer: Vec<u8>,
}

impl FrameDemux {
    /// Create an empty demultiplexer
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_FRAME_LEN),
        }
    }

    /// Append bytes read from the transport
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // Drop noise ahead of the first marker
        match self.buffer.iter().position(|&b| is_start_marker(b)) {
            Some(0) => {}
            Some(start) => {
                tracing::debug!("Discarding {} bytes before start marker", start);
                self.buffer.drain(..start);
            }
            None => {
                if !self.buffer.is_empty() {
                    tracing::debug!("Discarding {} unsynchronized bytes", self.buffer.len());
                }
                self.buffer.clear();
                return;
            }
        }

        // A tail this long without another marker will never become a frame
        if self.buffer.len() > MAX_FRAME_LEN * 4 && self.next_marker().is_none() {
            tracing::debug!(
                "Discarding {} byte unterminated frame: {:02X?}",
                self.buffer.len(),
                &self.buffer[..MAX_FRAME_LEN]
            );
            self.buffer.clear();
        }
    }

    /// Take the next complete frame, if its successor's marker has arrived
    pub fn next_frame(&mut self) -> Option<Frame> {
        let end = self.next_marker()?;
        Some(Frame(self.buffer.drain(..end).collect()))
    }

    /// Append bytes and return every frame they complete, in order
    pub fn feed(&mut self, data: &[u8]) -> Vec<Frame> {
        self.push_bytes(data);
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Bytes held back as a possibly incomplete frame
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Forget any buffered bytes
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Position of the marker that ends the frame at the head of the buffer
    fn next_marker(&self) -> Option<usize> {
        // The buffer always starts at a marker, so a frame is never empty
        self.buffer
            .iter()
            .skip(1)
            .position(|&b| is_start_marker(b))
            .map(|pos| pos + 1)
    }
}
