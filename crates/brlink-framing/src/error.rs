//! Framing error types.

use thiserror::Error;

/// Errors surfaced by the frame decoder.
///
/// These exist for diagnostics only. A link transports best-effort traffic:
/// the receive path counts and discards bad frames, resynchronizes on the
/// next delimiter, and reports nothing to the peer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The frame check sequence did not match the received payload.
    #[error("frame check sequence mismatch: computed 0x{computed:04X}, received 0x{received:04X}")]
    CrcMismatch {
        /// FCS recomputed over the received payload.
        computed: u16,
        /// FCS carried in the frame trailer.
        received: u16,
    },

    /// The unstuffed frame grew past the maximum frame size.
    #[error("frame exceeds maximum unstuffed size of {max} bytes")]
    Oversized {
        /// Maximum unstuffed frame size the decoder accepts.
        max: usize,
    },
}
