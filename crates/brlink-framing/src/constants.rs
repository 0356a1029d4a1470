//! Wire-format constants.

/// Frame delimiter byte. Marks the start and end of every frame and is never
/// escaped in that position.
pub const FLAG: u8 = 0x7E;

/// Escape byte. Introduces a stuffed literal inside the frame body.
pub const ESCAPE: u8 = 0x7D;

/// XOR mask applied to a byte following [`ESCAPE`] on the wire.
pub const ESCAPE_MASK: u8 = 0x20;

/// Maximum unstuffed frame content (payload plus 2 FCS bytes). The decoder
/// aborts and resynchronizes when a frame grows past this.
pub const MAX_FRAME_SIZE: usize = 200;

/// Largest payload that fits in a frame.
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - FCS_SIZE;

/// Size of the frame check sequence in bytes.
pub const FCS_SIZE: usize = 2;
