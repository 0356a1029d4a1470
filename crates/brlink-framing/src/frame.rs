//! Frame encoding and the reassembly state machine.
//!
//! Frames are delimited by [`FLAG`] bytes; any payload or FCS byte equal to
//! [`FLAG`] or [`ESCAPE`] travels as `ESCAPE, byte ^ ESCAPE_MASK`. The
//! decoder consumes one raw byte at a time so that it can be polled against
//! a queue that fills from interrupt context, and it keeps its session state
//! across polls because a frame may arrive split over many of them.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::{ESCAPE, ESCAPE_MASK, FCS_SIZE, FLAG, MAX_FRAME_SIZE};
use crate::crc;
use crate::error::FrameError;

/// Encodes a payload into its exact wire byte sequence.
///
/// The payload is folded into the CRC unstuffed, then emitted stuffed; the
/// complemented FCS follows, low byte first, each byte stuffed as well. The
/// delimiting [`FLAG`] bytes are always literal.
///
/// Payload length is not validated here: transmission is fire-and-forget
/// and the negotiated maximum datagram size is the caller's contract.
/// Frames longer than [`MAX_FRAME_SIZE`] unstuffed bytes will be discarded
/// by a conforming receiver.
pub fn encode(payload: &[u8]) -> Bytes {
    // Worst case every body byte is stuffed.
    let mut wire = BytesMut::with_capacity(2 * (payload.len() + FCS_SIZE) + 2);

    wire.put_u8(FLAG);
    let mut crc = crc::INIT;
    for &byte in payload {
        crc = crc::step(crc, byte);
        put_stuffed(&mut wire, byte);
    }
    let fcs = !crc;
    put_stuffed(&mut wire, (fcs & 0xFF) as u8);
    put_stuffed(&mut wire, (fcs >> 8) as u8);
    wire.put_u8(FLAG);

    wire.freeze()
}

fn put_stuffed(wire: &mut BytesMut, byte: u8) {
    if byte == FLAG || byte == ESCAPE {
        wire.put_u8(ESCAPE);
        wire.put_u8(byte ^ ESCAPE_MASK);
    } else {
        wire.put_u8(byte);
    }
}

/// Decoder state: either hunting for an opening delimiter or accumulating
/// frame content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// No frame start seen yet; every non-[`FLAG`] byte is discarded.
    Searching,
    /// A frame is open and unstuffed bytes are being accumulated.
    Receiving,
}

/// Incremental frame reassembler.
///
/// Feed raw wire bytes one at a time with [`feed`](Self::feed). The decoder
/// unstuffs, detects frame boundaries, and validates the FCS of every
/// candidate frame. All malformed-input handling is resynchronization, never
/// failure: after an error the decoder is already positioned to accept the
/// next frame.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecodeState,
    frame: BytesMut,
    last_byte: u8,
    max_frame_size: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Creates a decoder accepting frames up to [`MAX_FRAME_SIZE`] unstuffed
    /// bytes.
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// Creates a decoder with a custom frame size cap.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        FrameDecoder {
            state: DecodeState::Searching,
            frame: BytesMut::with_capacity(max_frame_size),
            last_byte: 0,
            max_frame_size,
        }
    }

    /// Current state of the reassembly machine.
    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Drops any partial frame and returns to the idle searching state.
    pub fn reset(&mut self) {
        self.state = DecodeState::Searching;
        self.frame.clear();
        self.last_byte = 0;
    }

    /// Processes one raw wire byte.
    ///
    /// Returns `Ok(None)` while a frame is still in flight, `Ok(Some(_))`
    /// with the validated payload (FCS stripped) when a frame completes, and
    /// `Err(_)` when a candidate frame was discarded. An error is
    /// informational: the decoder has already resynchronized and the caller
    /// may keep feeding bytes.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Bytes>, FrameError> {
        let result = match self.state {
            DecodeState::Searching => {
                if byte == FLAG {
                    self.state = DecodeState::Receiving;
                    self.frame.clear();
                }
                Ok(None)
            }
            DecodeState::Receiving => self.feed_receiving(byte),
        };
        self.last_byte = byte;
        result
    }

    fn feed_receiving(&mut self, byte: u8) -> Result<Option<Bytes>, FrameError> {
        if byte == FLAG {
            if self.last_byte == FLAG {
                // Doubled delimiter: the frame restarts, nothing was lost.
                self.frame.clear();
                return Ok(None);
            }
            if self.frame.len() > FCS_SIZE {
                return self.finish();
            }
            // Too short to carry payload and FCS; this delimiter opens the
            // next frame instead.
            self.frame.clear();
            return Ok(None);
        }

        if self.frame.len() >= self.max_frame_size {
            // Runaway frame, most likely a desynchronized peer. Drop it and
            // hunt for the next delimiter.
            self.state = DecodeState::Searching;
            self.frame.clear();
            return Err(FrameError::Oversized {
                max: self.max_frame_size,
            });
        }

        if byte == ESCAPE {
            // Not stored; the next byte arrives masked.
            return Ok(None);
        }

        let value = if self.last_byte == ESCAPE {
            byte ^ ESCAPE_MASK
        } else {
            byte
        };
        self.frame.put_u8(value);
        Ok(None)
    }

    /// Validates a candidate frame terminated by the current delimiter.
    fn finish(&mut self) -> Result<Option<Bytes>, FrameError> {
        // The terminating delimiter may already open the next frame.
        self.state = DecodeState::Receiving;

        let frame = self.frame.split().freeze();
        let body_len = frame.len() - FCS_SIZE;
        let computed = crc::checksum(&frame[..body_len]);
        let received = u16::from_le_bytes([frame[body_len], frame[body_len + 1]]);

        if computed == received {
            Ok(Some(frame.slice(..body_len)))
        } else {
            Err(FrameError::CrcMismatch { computed, received })
        }
    }
}
