//! LC-1 Protocol Library
//!
//! This crate provides framing and encoding for the serial protocol spoken by
//! the Innovate LC-1 wideband lambda controller:
//!
//! - **Value codec**: decimal values packed as value×10 into two 7-bit bytes
//! - **Frame demultiplexer**: splits an unframed byte stream at start markers
//! - **Message interpreter**: classifies frames as telemetry or replies
//!
//! # Frame Format
//! ```text
//! B2 [dev] [v1 hi] [v1 lo] [v2 hi] [v2 lo]     telemetry (unsolicited)
//! A2 [dev] [payload...]                        reply to a command byte
//! ```
//!
//! Frames carry no length and no terminator. A frame ends where the next
//! start marker begins, so the last frame in a buffer is only known to be
//! complete once the following marker has arrived. Payload bytes never have
//! the high bit set, which keeps the markers unambiguous.
//!
//! Commands sent to the controller are single bytes (`F3` identify,
//! `CE` version) with no framing at all.
//!
//! # Example
//!
//! ```rust
//! use lc1_protocol::{FrameDemux, Message};
//!
//! let mut demux = FrameDemux::new();
//! let frames = demux.feed(&[0xB2, 0x82, 0x00, 0x0A, 0x00, 0x14, 0xB2]);
//! assert_eq!(frames.len(), 1);
//!
//! match Message::parse(&frames[0]) {
//!     Ok(Message::Telemetry { value1, value2, .. }) => {
//!         assert_eq!(value1, 1.0);
//!         assert_eq!(value2, 2.0);
//!     }
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{decode_value, encode_value, raw_value, MAX_VALUE};
pub use error::ParseError;
pub use frame::{Frame, FrameDemux, FrameKind, MAX_FRAME_LEN};
pub use message::{interpret, is_heater_marker, Command, Message, HEATER_MARKER};

/// Start marker of an unsolicited telemetry frame
pub const STREAM_START: u8 = 0xB2;
/// Start marker of a reply frame
pub const REQUEST_START: u8 = 0xA2;
/// Nominal device address carried in telemetry frames
pub const DEVICE_ID: u8 = 0x82;

/// Serial line speed used by the controller
pub const BAUD_RATE: u32 = 19_200;

/// Trait for values that can be encoded to their wire format
pub trait Encode {
    /// Encode this value to bytes ready for the transport
    fn encode(&self) -> Vec<u8>;
}
