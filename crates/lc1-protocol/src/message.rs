//! Message interpretation
//!
//! A [`Frame`] becomes a [`Message`] by looking at its first two bytes: the
//! start marker picks the variant and the second byte is the device address.

use crate::codec::{decode_value, encode_value, raw_value};
use crate::error::ParseError;
use crate::frame::{Frame, FrameKind};
use crate::{Encode, DEVICE_ID};

/// Sentinel sent in `value1` while the sensor heater is warming up
///
/// `value2` then carries the heater duty ×100 instead of an O2 reading.
pub const HEATER_MARKER: f64 = 1064.3;

/// Returns true if a telemetry `value1` is the heater warm-up sentinel
///
/// Compared on the raw 14-bit value so decoding noise can't matter.
pub fn is_heater_marker(value1: f64) -> bool {
    raw_value(value1) == raw_value(HEATER_MARKER)
}

/// Minimum telemetry frame: marker, device id, two 2-byte values
const TELEMETRY_LEN: usize = 6;
/// Minimum reply frame: marker, device id
const REPLY_HEADER_LEN: usize = 2;

/// Command bytes understood by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// Request the identification string (`0xF3`)
    RequestId,
    /// Request the firmware version (`0xCE`)
    RequestVersion,
}

impl Command {
    /// Wire byte for this command
    pub fn byte(&self) -> u8 {
        match self {
            Self::RequestId => 0xF3,
            Self::RequestVersion => 0xCE,
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0xF3 => Ok(Self::RequestId),
            0xCE => Ok(Self::RequestVersion),
            _ => Err(ParseError::UnknownCommand(value)),
        }
    }
}

impl Encode for Command {
    fn encode(&self) -> Vec<u8> {
        vec![self.byte()]
    }
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Message {
    /// Periodic sensor reading
    Telemetry {
        device_id: u8,
        value1: f64,
        value2: f64,
    },
    /// Answer to a command byte; payload meaning depends on the command
    Reply { device_id: u8, payload: Vec<u8> },
}

impl Message {
    /// Telemetry reporting heater duty (`0.0..=1.0`) during warm-up
    pub fn heater(duty: f64) -> Self {
        Self::Telemetry {
            device_id: DEVICE_ID,
            value1: HEATER_MARKER,
            value2: duty * 100.0,
        }
    }

    /// Telemetry reporting a lambda reading and an O2 fraction
    pub fn lambda_o2(lambda: f64, o2: f64) -> Self {
        Self::Telemetry {
            device_id: DEVICE_ID,
            value1: (lambda - 0.5) * 100.0,
            value2: o2 * 100.0,
        }
    }

    /// Interpret a frame, reporting why it was rejected
    pub fn parse(frame: &Frame) -> Result<Self, ParseError> {
        let bytes = frame.as_bytes();
        let first = bytes.first().copied().unwrap_or_default();
        let kind = FrameKind::from_marker(first).ok_or(ParseError::UnknownFrameKind(first))?;

        let needed = match kind {
            FrameKind::Stream => TELEMETRY_LEN,
            FrameKind::Request => REPLY_HEADER_LEN,
        };
        if bytes.len() < needed {
            return Err(ParseError::ShortFrame {
                kind,
                len: bytes.len(),
                needed,
            });
        }

        let device_id = bytes[1];
        Ok(match kind {
            FrameKind::Stream => Self::Telemetry {
                device_id,
                value1: decode_value(bytes[2], bytes[3]),
                value2: decode_value(bytes[4], bytes[5]),
            },
            FrameKind::Request => Self::Reply {
                device_id,
                payload: bytes[2..].to_vec(),
            },
        })
    }

    /// Frame kind this message is sent as
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Telemetry { .. } => FrameKind::Stream,
            Self::Reply { .. } => FrameKind::Request,
        }
    }

    /// Returns true if this is heater warm-up telemetry
    pub fn is_heater(&self) -> bool {
        match self {
            Self::Telemetry { value1, .. } => is_heater_marker(*value1),
            Self::Reply { .. } => false,
        }
    }
}

impl Encode for Message {
    fn encode(&self) -> Vec<u8> {
        match self {
            Self::Telemetry {
                device_id,
                value1,
                value2,
            } => {
                let mut out = Vec::with_capacity(TELEMETRY_LEN);
                out.push(FrameKind::Stream.marker());
                out.push(*device_id);
                out.extend_from_slice(&encode_value(*value1));
                out.extend_from_slice(&encode_value(*value2));
                out
            }
            Self::Reply { device_id, payload } => {
                let mut out = Vec::with_capacity(REPLY_HEADER_LEN + payload.len());
                out.push(FrameKind::Request.marker());
                out.push(*device_id);
                out.extend_from_slice(payload);
                out
            }
        }
    }
}

/// Interpret a frame, dropping anything malformed
///
/// Short frames and unknown kinds are expected on a noisy line; they are
/// logged at debug level and yield `None`.
pub fn interpret(frame: &Frame) -> Option<Message> {
    match Message::parse(frame) {
        Ok(msg) => Some(msg),
        Err(e) => {
            tracing::debug!("Dropping malformed frame {:?}: {}", frame, e);
            None
        }
    }
}
