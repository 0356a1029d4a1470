//! Framing codec for the border router serial link.
//!
//! A node talks to its border router over a raw byte-oriented serial line.
//! This crate implements the wire format used on that line: HDLC-style
//! delimited frames with byte stuffing and a CRC-16/X-25 frame check
//! sequence.
//!
//! ```text
//! +------+--------------------------+---------+---------+------+
//! | FLAG | stuffed payload bytes    | FCS lo  | FCS hi  | FLAG |
//! +------+--------------------------+---------+---------+------+
//! ```
//!
//! The CRC is computed over the unstuffed payload only, complemented, and
//! transmitted little-endian (each FCS byte is itself subject to stuffing).
//! The codec here is pure: [`encode`] produces the exact wire byte sequence
//! and [`FrameDecoder`] reassembles frames byte by byte, leaving queueing
//! and interrupt handling to the transport layer.
//!
//! # Example
//!
//! ```rust
//! use brlink_framing::{encode, FrameDecoder};
//!
//! let wire = encode(&[0x01, 0x02, 0x03]);
//!
//! let mut decoder = FrameDecoder::new();
//! let mut payload = None;
//! for &byte in wire.iter() {
//!     if let Ok(Some(frame)) = decoder.feed(byte) {
//!         payload = Some(frame);
//!     }
//! }
//! assert_eq!(payload.as_deref(), Some(&[0x01, 0x02, 0x03][..]));
//! ```

pub mod crc;

mod constants;
mod error;
mod frame;

pub use constants::*;
pub use error::*;
pub use frame::*;
