//! Fixed-length frame codec
//!
//! Every command written to a light is a single 20-byte frame:
//! ```text
//! [ 0x33 ][ command id ][ 17 bytes: payload, zero padded ][ checksum ]
//! ```
//!
//! The checksum is the XOR of the 19 bytes that precede it, so the XOR of a
//! whole frame is always zero.

use std::fmt;

use bytes::{BufMut, BytesMut};
use thiserror::Error;

/// Magic byte opening every frame
pub const FRAME_MAGIC: u8 = 0x33;

/// Total serialized frame length
pub const FRAME_LEN: usize = 20;

/// Maximum payload carried by a single frame
pub const MAX_PAYLOAD_LEN: usize = 17;

/// Length of the checksummed body (magic + command + payload)
const BODY_LEN: usize = FRAME_LEN - 1;

/// Command identifiers understood by the lights
pub mod command_id {
    /// Power on/off
    pub const POWER: u8 = 0x01;
    /// Brightness level
    pub const BRIGHTNESS: u8 = 0x04;
    /// Mode selection (color, temperature, scene, music, video)
    pub const MODE: u8 = 0x05;
}

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Payload too long: {0} bytes (max: {MAX_PAYLOAD_LEN})")]
    PayloadTooLong(usize),

    #[error("Invalid frame length: {0} bytes (expected: {FRAME_LEN})")]
    InvalidLength(usize),

    #[error("Bad magic byte: {0:#04x}")]
    BadMagic(u8),

    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },
}

/// A complete, checksummed frame
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl Frame {
    /// Command identifier carried at offset 1
    pub fn command_id(&self) -> u8 {
        self.0[1]
    }

    /// Zero-padded payload area (offsets 2..19)
    pub fn payload(&self) -> &[u8] {
        &self.0[2..BODY_LEN]
    }

    /// Trailing checksum byte
    pub fn checksum(&self) -> u8 {
        self.0[BODY_LEN]
    }

    /// Raw bytes as written to the device
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Parse and validate raw bytes received from a device
    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        let bytes: [u8; FRAME_LEN] = data
            .try_into()
            .map_err(|_| FrameError::InvalidLength(data.len()))?;

        if bytes[0] != FRAME_MAGIC {
            return Err(FrameError::BadMagic(bytes[0]));
        }

        let expected = xor_checksum(&bytes[..BODY_LEN]);
        let actual = bytes[BODY_LEN];
        if expected != actual {
            return Err(FrameError::ChecksumMismatch { expected, actual });
        }

        Ok(Self(bytes))
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// XOR of every byte in `data`
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

/// Encode a command id and payload into a frame
pub fn encode(command_id: u8, payload: &[u8]) -> Result<Frame, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLong(payload.len()));
    }

    let mut buf = BytesMut::with_capacity(FRAME_LEN);
    buf.put_u8(FRAME_MAGIC);
    buf.put_u8(command_id);
    buf.put_slice(payload);
    buf.put_bytes(0, BODY_LEN - buf.len());

    let checksum = xor_checksum(&buf);
    buf.put_u8(checksum);

    let mut frame = [0u8; FRAME_LEN];
    frame.copy_from_slice(&buf);
    Ok(Frame(frame))
}
