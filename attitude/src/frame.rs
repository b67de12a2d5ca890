//! Byte-at-a-time frame decoder for the serial IMU protocol
//!
//! # Frame Layout
//!
//! ```text
//! [0x49][addr][len][payload: len bytes][checksum][0x4D]
//! ```
//!
//! - `addr` is the sender's address. `0xFF` is the host broadcast address
//!   and never appears in a device frame.
//! - `len` is the payload length, 1 to [`MAX_PAYLOAD_LEN`].
//! - `checksum` is the mod-256 sum of `addr`, `len` and the payload.
//!
//! The decoder owns a single fixed-size buffer and never allocates. Framing
//! errors are expected on a continuous stream: they reset the decoder, bump a
//! counter and are otherwise silent. A rejected byte is re-examined as a
//! possible start marker, so a frame that begins inside garbage is not lost.

use thiserror::Error;
use tracing::trace;

use crate::checksum::compute_checksum;

/// Frame start marker
pub const FRAME_START: u8 = 0x49;

/// Frame end marker
pub const FRAME_END: u8 = 0x4D;

/// Largest payload a device may send
pub const MAX_PAYLOAD_LEN: usize = 73;

/// Start, address, length, checksum and end bytes
pub const FRAME_OVERHEAD: usize = 5;

/// Host broadcast address, only valid in host-to-device frames
pub const BROADCAST_ADDRESS: u8 = 0xFF;

/// Offset of the first payload byte within a frame
const PAYLOAD_OFFSET: usize = 3;

/// Reasons a frame or payload is rejected.
///
/// All of these are recoverable: the decoder resets and continues with the
/// next byte.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    #[error("Address 0x{0:02X} is reserved for host broadcast")]
    RejectedAddress(u8),

    #[error("Invalid payload length {0} (must be 1..=73)")]
    InvalidLength(u8),

    #[error("Checksum mismatch: computed 0x{computed:02X}, received 0x{received:02X}")]
    ChecksumMismatch { computed: u8, received: u8 },

    #[error("Expected end marker 0x4D, got 0x{0:02X}")]
    MissingEndMarker(u8),

    /// The control bitmask promises more fields than the payload holds.
    #[error("Payload truncated: field needs {needed} bytes at offset {offset}, payload is {available} bytes")]
    TruncatedPayload {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

/// Decoder position within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    AwaitStart,
    AwaitAddress,
    AwaitLength,
    AwaitPayload,
    AwaitChecksum,
    AwaitEnd,
}

/// Diagnostic counters for a decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecoderStats {
    /// Frames that passed every check
    pub frames_decoded: u64,
    /// Frames abandoned because of a framing error
    pub framing_errors: u64,
}

/// A checksum-verified payload borrowed from the decoder's buffer.
///
/// Valid until the next call to [`FrameDecoder::feed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedPayload<'a> {
    address: u8,
    bytes: &'a [u8],
}

impl<'a> ValidatedPayload<'a> {
    /// Address byte of the frame
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Payload bytes (excludes header, checksum and end marker)
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Declared payload length
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false: zero-length frames are rejected by the decoder
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::ops::Deref for ValidatedPayload<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

/// Streaming decoder for serial IMU frames.
///
/// One decoder per device; feed it every received byte in order.
///
/// # Example
///
/// ```
/// use attitude::{encode_frame, FrameDecoder};
///
/// let frame = encode_frame(0x00, &[0x11, 0x00, 0x00]).unwrap();
/// let mut decoder = FrameDecoder::new();
///
/// let mut payloads = Vec::new();
/// for byte in frame {
///     if let Some(payload) = decoder.feed(byte) {
///         payloads.push(payload.to_vec());
///     }
/// }
/// assert_eq!(payloads, vec![vec![0x11, 0x00, 0x00]]);
/// ```
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    buffer: [u8; MAX_PAYLOAD_LEN + FRAME_OVERHEAD],
    len: usize,
    payload_len: usize,
    state: DecoderState,
    stats: DecoderStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: [0; MAX_PAYLOAD_LEN + FRAME_OVERHEAD],
            len: 0,
            payload_len: 0,
            state: DecoderState::AwaitStart,
            stats: DecoderStats::default(),
        }
    }

    /// Current decoder state
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Diagnostic counters
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Drop any partial frame and wait for the next start marker.
    pub fn reset(&mut self) {
        self.state = DecoderState::AwaitStart;
        self.len = 0;
        self.payload_len = 0;
    }

    /// Consume one byte.
    ///
    /// Returns the payload on the byte that completes a valid frame, `None`
    /// otherwise. Never fails: malformed input resets the decoder.
    pub fn feed(&mut self, byte: u8) -> Option<ValidatedPayload<'_>> {
        match self.step(byte) {
            Ok(false) => None,
            Ok(true) => {
                self.stats.frames_decoded += 1;
                let end = PAYLOAD_OFFSET + self.payload_len;
                Some(ValidatedPayload {
                    address: self.buffer[1],
                    bytes: &self.buffer[PAYLOAD_OFFSET..end],
                })
            }
            Err(err) => {
                self.stats.framing_errors += 1;
                trace!("Frame discarded: {err}");
                self.reset();
                if byte == FRAME_START {
                    self.begin_frame();
                }
                None
            }
        }
    }

    /// Feed a chunk of bytes, calling `on_payload` for each completed frame.
    pub fn feed_all<F>(&mut self, bytes: &[u8], mut on_payload: F)
    where
        F: FnMut(ValidatedPayload<'_>),
    {
        for &byte in bytes {
            if let Some(payload) = self.feed(byte) {
                on_payload(payload);
            }
        }
    }

    fn begin_frame(&mut self) {
        self.buffer[0] = FRAME_START;
        self.len = 1;
        self.payload_len = 0;
        self.state = DecoderState::AwaitAddress;
    }

    fn push(&mut self, byte: u8) {
        // len never exceeds PAYLOAD_OFFSET + MAX_PAYLOAD_LEN + 2 by construction
        self.buffer[self.len] = byte;
        self.len += 1;
    }

    /// Advance the state machine. `Ok(true)` means a frame just completed.
    fn step(&mut self, byte: u8) -> Result<bool, FramingError> {
        match self.state {
            DecoderState::AwaitStart => {
                if byte == FRAME_START {
                    self.begin_frame();
                }
            }
            DecoderState::AwaitAddress => {
                if byte == BROADCAST_ADDRESS {
                    return Err(FramingError::RejectedAddress(byte));
                }
                self.push(byte);
                self.state = DecoderState::AwaitLength;
            }
            DecoderState::AwaitLength => {
                if byte == 0 || usize::from(byte) > MAX_PAYLOAD_LEN {
                    return Err(FramingError::InvalidLength(byte));
                }
                self.push(byte);
                self.payload_len = usize::from(byte);
                self.state = DecoderState::AwaitPayload;
            }
            DecoderState::AwaitPayload => {
                self.push(byte);
                if self.len == PAYLOAD_OFFSET + self.payload_len {
                    self.state = DecoderState::AwaitChecksum;
                }
            }
            DecoderState::AwaitChecksum => {
                let computed = compute_checksum(&self.buffer[1..self.len]);
                if computed != byte {
                    return Err(FramingError::ChecksumMismatch {
                        computed,
                        received: byte,
                    });
                }
                self.push(byte);
                self.state = DecoderState::AwaitEnd;
            }
            DecoderState::AwaitEnd => {
                if byte != FRAME_END {
                    return Err(FramingError::MissingEndMarker(byte));
                }
                self.push(byte);
                self.state = DecoderState::AwaitStart;
                return Ok(true);
            }
        }
        Ok(false)
    }
}
