//! Serial transport for the border router link.
//!
//! This crate turns the pure codec from `brlink-framing` into a working
//! link layer over a byte-oriented serial port. It owns the two fixed-size
//! byte queues that decouple interrupt context from the main loop, the
//! transmit pump that drains the outbound queue on byte-sent interrupts,
//! and the polled receive path that reassembles frames from the inbound
//! queue.
//!
//! The design is fire-and-forget: nothing blocks, nothing retransmits, and
//! a full queue silently drops bytes. That trade-off suits a best-effort
//! telemetry link; anything requiring delivery guarantees must layer them
//! on top. Every silent drop is still counted in [`LinkStats`] so a
//! struggling link can at least be diagnosed.
//!
//! # Execution contexts
//!
//! There are exactly two: the platform's interrupt handlers, which drive a
//! [`LinkIsr`] handle, and the main context, which drives the [`Link`]
//! itself. All shared state sits behind one scoped exclusion region; no
//! operation holds it across a wait.

mod link;
mod queue;
mod stats;

pub use link::*;
pub use queue::*;
pub use stats::*;
