//! Diagnostic counters.

/// Running totals for one link instance.
///
/// The link never reports loss to its caller; a frame that failed its CRC
/// and an empty queue both come back as "nothing yet". These counters make
/// the difference observable without changing that contract. They are
/// updated inside the link's exclusion region and snapshotted by
/// [`Link::stats`](crate::Link::stats).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkStats {
    /// Frames handed to the transmit path.
    pub frames_sent: u64,
    /// Valid frames delivered to a caller.
    pub frames_received: u64,
    /// Candidate frames discarded on a frame-check-sequence mismatch.
    pub crc_errors: u64,
    /// Frames aborted for growing past the maximum unstuffed size.
    pub oversized_frames: u64,
    /// Valid frames dropped because the caller's buffer was too small.
    pub frames_dropped: u64,
    /// Outbound bytes dropped on a full transmit queue.
    pub tx_bytes_dropped: u64,
    /// Inbound bytes dropped on a full receive queue.
    pub rx_bytes_dropped: u64,
}
