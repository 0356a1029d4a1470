//! The link context: framed and raw transmit/receive over a serial port.
//!
//! A [`Link`] owns the main-context side (the decoder session state and the
//! public send/receive surface); its paired [`LinkIsr`] handle is driven by
//! the platform's interrupt handlers. Both sides share the byte queues, the
//! port, the transmitting flag, and the counters through a single scoped
//! exclusion region that is released on every exit path.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use brlink_framing::{encode, FrameDecoder, FrameError, MAX_FRAME_SIZE};
use log::{debug, trace};

use crate::queue::ByteQueue;
use crate::stats::LinkStats;

/// Default outbound queue capacity; sized for a data frame plus a status
/// frame queued within one slot.
pub const DEFAULT_TX_QUEUE_CAPACITY: usize = 256;

/// Default inbound queue capacity.
pub const DEFAULT_RX_QUEUE_CAPACITY: usize = 512;

/// The single-byte serial transport the link drives.
///
/// Implementations wrap the platform UART (or any equivalent byte pipe).
/// `write_byte` must schedule one byte without blocking; the platform
/// signals completion by invoking [`LinkIsr::on_byte_sent`]. `read_byte` is
/// only called from inside [`LinkIsr::on_byte_received`] and returns the
/// byte that raised the receive interrupt. `request_reset` is the platform
/// reset hook consumed by [`Link::reset`].
pub trait SerialPort: Send {
    /// Schedules a single byte for transmission, non-blocking.
    fn write_byte(&mut self, byte: u8);

    /// Returns the most recently received byte.
    fn read_byte(&mut self) -> u8;

    /// Requests a hard platform reset.
    fn request_reset(&mut self);
}

/// Per-instance tuning for a [`Link`].
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Outbound queue capacity in bytes.
    pub tx_queue_capacity: usize,
    /// Inbound queue capacity in bytes.
    pub rx_queue_capacity: usize,
    /// Maximum unstuffed frame size accepted by the decoder.
    pub max_frame_size: usize,
    /// How long [`Link::reset`] lets in-flight bytes drain before the
    /// platform reset is requested.
    pub reset_drain: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            tx_queue_capacity: DEFAULT_TX_QUEUE_CAPACITY,
            rx_queue_capacity: DEFAULT_RX_QUEUE_CAPACITY,
            max_frame_size: MAX_FRAME_SIZE,
            reset_drain: Duration::from_millis(100),
        }
    }
}

/// State shared between the main context and the interrupt context.
struct Shared<P> {
    port: P,
    tx_queue: ByteQueue,
    rx_queue: ByteQueue,
    /// True while a byte is in flight on the port.
    transmitting: bool,
    stats: LinkStats,
}

/// Enters the exclusion region. A poisoned region is entered anyway: the
/// shared state never holds a broken invariant across the bracket, and the
/// interrupt side must keep running even if the main context panicked.
fn lock<P>(shared: &Mutex<Shared<P>>) -> MutexGuard<'_, Shared<P>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Main-context handle for one serial link.
///
/// Created together with its interrupt-side [`LinkIsr`] by [`Link::new`].
/// The framed surface is [`send`](Self::send) and
/// [`receive`](Self::receive); [`send_raw`](Self::send_raw) and
/// [`receive_raw`](Self::receive_raw) bypass the codec for bootstrap or
/// diagnostic exchanges and must not run concurrently with framed traffic.
pub struct Link<P: SerialPort> {
    shared: Arc<Mutex<Shared<P>>>,
    /// Frame reassembly session state; main context only, so it lives
    /// outside the exclusion region.
    decoder: FrameDecoder,
    reset_drain: Duration,
}

/// Interrupt-context handle paired with a [`Link`].
///
/// The platform glue calls [`on_byte_sent`](Self::on_byte_sent) from its
/// transmit-complete handler and [`on_byte_received`](Self::on_byte_received)
/// from its receive handler. Clone freely if the two handlers live in
/// different places.
pub struct LinkIsr<P: SerialPort> {
    shared: Arc<Mutex<Shared<P>>>,
}

impl<P: SerialPort> Clone for LinkIsr<P> {
    fn clone(&self) -> Self {
        LinkIsr {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: SerialPort> Link<P> {
    /// Initializes a link over `port`: both queues empty, transmitter idle.
    ///
    /// Returns the main-context link and the interrupt handle the platform
    /// wires into its UART callbacks.
    pub fn new(port: P, config: LinkConfig) -> (Self, LinkIsr<P>) {
        let shared = Arc::new(Mutex::new(Shared {
            port,
            tx_queue: ByteQueue::new(config.tx_queue_capacity),
            rx_queue: ByteQueue::new(config.rx_queue_capacity),
            transmitting: false,
            stats: LinkStats::default(),
        }));
        let isr = LinkIsr {
            shared: Arc::clone(&shared),
        };
        let link = Link {
            shared,
            decoder: FrameDecoder::with_max_frame_size(config.max_frame_size),
            reset_drain: config.reset_drain,
        };
        (link, isr)
    }

    /// Deinitializes the link: queues cleared, transmitter idle, any
    /// partially reassembled frame dropped.
    ///
    /// The platform must stop invoking the paired [`LinkIsr`] before calling
    /// this; the handle itself stays valid should the link be reused.
    pub fn deinit(&mut self) {
        let mut shared = lock(&self.shared);
        shared.tx_queue.clear();
        shared.rx_queue.clear();
        shared.transmitting = false;
        drop(shared);
        self.decoder.reset();
    }

    /// Sends one framed payload.
    ///
    /// The frame is scheduled byte by byte: written straight to the port
    /// while the transmitter is idle, queued outbound otherwise. There is no
    /// failure report; bytes that do not fit the outbound queue are dropped
    /// and counted. Fire-and-forget by design.
    pub fn send(&self, payload: &[u8]) {
        let wire = encode(payload);
        trace!(
            "sending frame: {} payload bytes, {} on the wire",
            payload.len(),
            wire.len()
        );
        for &byte in wire.iter() {
            self.write_port(byte);
        }
        lock(&self.shared).stats.frames_sent += 1;
    }

    /// Polls for one framed payload.
    ///
    /// Drains the inbound queue through the reassembler until one candidate
    /// frame terminates or the queue runs dry; at most one frame is
    /// surfaced per call. Returns the payload length, or 0 when no
    /// complete, valid frame was available this call.
    ///
    /// A valid frame larger than `buffer` is dropped in its entirety and 0
    /// is returned; the caller cannot distinguish this from an idle line,
    /// so size the buffer for [`MAX_FRAME_SIZE`] minus the FCS. The loss is
    /// recorded in [`LinkStats::frames_dropped`].
    pub fn receive(&mut self, buffer: &mut [u8]) -> usize {
        loop {
            let byte = match lock(&self.shared).rx_queue.pop() {
                Some(byte) => byte,
                None => return 0,
            };

            match self.decoder.feed(byte) {
                Ok(None) => {}
                Ok(Some(payload)) => {
                    let mut shared = lock(&self.shared);
                    if buffer.len() >= payload.len() {
                        buffer[..payload.len()].copy_from_slice(&payload);
                        shared.stats.frames_received += 1;
                        return payload.len();
                    }
                    debug!(
                        "dropping {}-byte frame: caller buffer holds {}",
                        payload.len(),
                        buffer.len()
                    );
                    shared.stats.frames_dropped += 1;
                    return 0;
                }
                Err(FrameError::Oversized { max }) => {
                    debug!("aborted frame past {} bytes, resynchronizing", max);
                    lock(&self.shared).stats.oversized_frames += 1;
                    // Not a frame boundary; keep draining within this call.
                }
                Err(e @ FrameError::CrcMismatch { .. }) => {
                    debug!("discarded frame: {}", e);
                    lock(&self.shared).stats.crc_errors += 1;
                    // A candidate frame ended; one candidate per call.
                    return 0;
                }
            }
        }
    }

    /// Writes bytes through the transmit path with no framing applied.
    pub fn send_raw(&self, data: &[u8]) {
        for &byte in data {
            self.write_port(byte);
        }
    }

    /// Drains up to `buffer.len()` inbound bytes with no framing
    /// interpretation. Returns the count copied.
    pub fn receive_raw(&self, buffer: &mut [u8]) -> usize {
        let mut shared = lock(&self.shared);
        let mut count = 0;
        while count < buffer.len() {
            match shared.rx_queue.pop() {
                Some(byte) => {
                    buffer[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    /// True while a transmission is in flight.
    pub fn is_busy(&self) -> bool {
        lock(&self.shared).transmitting
    }

    /// Snapshot of the diagnostic counters.
    pub fn stats(&self) -> LinkStats {
        lock(&self.shared).stats
    }

    /// Lets in-flight bytes drain, then requests a hard platform reset
    /// through the port.
    pub fn reset(&self) {
        thread::sleep(self.reset_drain);
        lock(&self.shared).port.request_reset();
    }

    /// Single-byte transmit path shared by the framed and raw senders:
    /// kicks off the hardware pump when idle, queues behind it otherwise.
    /// The exclusion region is entered per byte so the interrupt context is
    /// never deferred for a whole frame.
    fn write_port(&self, byte: u8) {
        let mut shared = lock(&self.shared);
        if shared.transmitting {
            if !shared.tx_queue.push(byte) {
                shared.stats.tx_bytes_dropped += 1;
                debug!("outbound queue full, byte dropped");
            }
        } else {
            shared.transmitting = true;
            shared.port.write_byte(byte);
        }
    }
}

impl<P: SerialPort> LinkIsr<P> {
    /// Transmit-complete handler: pushes the next queued byte to the port,
    /// or marks the transmitter idle when the queue has drained.
    pub fn on_byte_sent(&self) {
        let mut shared = lock(&self.shared);
        match shared.tx_queue.pop() {
            Some(byte) => shared.port.write_byte(byte),
            None => shared.transmitting = false,
        }
    }

    /// Receive handler: reads the byte that raised the interrupt and queues
    /// it inbound. A full queue drops the byte; the loss is counted.
    pub fn on_byte_received(&self) {
        let mut shared = lock(&self.shared);
        let byte = shared.port.read_byte();
        if !shared.rx_queue.push(byte) {
            shared.stats.rx_bytes_dropped += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Port stub that records writes and serves scripted reads.
    struct StubPort {
        written: Arc<StdMutex<Vec<u8>>>,
        to_read: Arc<StdMutex<VecDeque<u8>>>,
        resets: Arc<StdMutex<u32>>,
    }

    struct StubHandles {
        written: Arc<StdMutex<Vec<u8>>>,
        to_read: Arc<StdMutex<VecDeque<u8>>>,
        resets: Arc<StdMutex<u32>>,
    }

    fn stub_port() -> (StubPort, StubHandles) {
        let written = Arc::new(StdMutex::new(Vec::new()));
        let to_read = Arc::new(StdMutex::new(VecDeque::new()));
        let resets = Arc::new(StdMutex::new(0));
        (
            StubPort {
                written: written.clone(),
                to_read: to_read.clone(),
                resets: resets.clone(),
            },
            StubHandles {
                written,
                to_read,
                resets,
            },
        )
    }

    impl SerialPort for StubPort {
        fn write_byte(&mut self, byte: u8) {
            self.written.lock().unwrap().push(byte);
        }

        fn read_byte(&mut self) -> u8 {
            self.to_read.lock().unwrap().pop_front().unwrap()
        }

        fn request_reset(&mut self) {
            *self.resets.lock().unwrap() += 1;
        }
    }

    /// Feeds a raw byte stream through the receive interrupt.
    fn inject(handles: &StubHandles, isr: &LinkIsr<StubPort>, stream: &[u8]) {
        for &byte in stream {
            handles.to_read.lock().unwrap().push_back(byte);
            isr.on_byte_received();
        }
    }

    #[test]
    fn test_send_kicks_off_then_queues() {
        let (port, handles) = stub_port();
        let (link, _isr) = Link::new(port, LinkConfig::default());

        link.send(&[0x01, 0x02, 0x03]);
        // Only the first byte goes straight to the port; the rest wait for
        // transmit-complete interrupts.
        assert_eq!(handles.written.lock().unwrap().as_slice(), &[0x7E]);
        assert!(link.is_busy());
        assert_eq!(link.stats().frames_sent, 1);
    }

    #[test]
    fn test_pump_drains_and_goes_idle() {
        let (port, handles) = stub_port();
        let (link, isr) = Link::new(port, LinkConfig::default());

        link.send(&[0xAA]);
        while link.is_busy() {
            isr.on_byte_sent();
        }
        let written = handles.written.lock().unwrap();
        // 0xAA with FCS 0xFA28: no stuffing anywhere.
        assert_eq!(written.as_slice(), &[0x7E, 0xAA, 0x28, 0xFA, 0x7E]);
        drop(written);
        assert!(!link.is_busy());
    }

    #[test]
    fn test_receive_round_trip_through_queue() {
        let (port, handles) = stub_port();
        let (mut link, isr) = Link::new(port, LinkConfig::default());

        inject(&handles, &isr, &encode(&[0x10, 0x20, 0x30]));

        let mut buffer = [0u8; 64];
        assert_eq!(link.receive(&mut buffer), 3);
        assert_eq!(&buffer[..3], &[0x10, 0x20, 0x30]);
        assert_eq!(link.stats().frames_received, 1);

        // Queue drained: further polls see nothing.
        assert_eq!(link.receive(&mut buffer), 0);
    }

    #[test]
    fn test_receive_undersized_buffer_drops_frame() {
        let (port, handles) = stub_port();
        let (mut link, isr) = Link::new(port, LinkConfig::default());

        inject(&handles, &isr, &encode(&[0x01, 0x02, 0x03, 0x04]));

        let mut small = [0u8; 2];
        assert_eq!(link.receive(&mut small), 0);
        assert_eq!(small, [0, 0]);
        assert_eq!(link.stats().frames_dropped, 1);
        // The frame is gone, not waiting for a bigger buffer.
        let mut big = [0u8; 64];
        assert_eq!(link.receive(&mut big), 0);
    }

    #[test]
    fn test_receive_crc_mismatch_counts_and_recovers() {
        let (port, handles) = stub_port();
        let (mut link, isr) = Link::new(port, LinkConfig::default());

        let mut corrupt = encode(&[0x01, 0x02, 0x03]).to_vec();
        corrupt[2] ^= 0x01;
        inject(&handles, &isr, &corrupt);
        inject(&handles, &isr, &encode(&[0x0A, 0x0B, 0x0C]));

        let mut buffer = [0u8; 64];
        // First poll consumes the corrupt candidate and reports nothing.
        assert_eq!(link.receive(&mut buffer), 0);
        assert_eq!(link.stats().crc_errors, 1);
        // Second poll recovers the healthy frame.
        assert_eq!(link.receive(&mut buffer), 3);
        assert_eq!(&buffer[..3], &[0x0A, 0x0B, 0x0C]);
    }

    #[test]
    fn test_idempotent_polling_when_idle() {
        let (port, handles) = stub_port();
        let (mut link, isr) = Link::new(port, LinkConfig::default());

        let mut buffer = [0u8; 64];
        for _ in 0..10 {
            assert_eq!(link.receive(&mut buffer), 0);
        }

        // Polling an idle line must not have disturbed the session state:
        // a frame that arrives afterwards still decodes.
        inject(&handles, &isr, &encode(&[0x42]));
        assert_eq!(link.receive(&mut buffer), 1);
        assert_eq!(buffer[0], 0x42);
    }

    #[test]
    fn test_tx_overflow_counted() {
        let (port, _handles) = stub_port();
        let config = LinkConfig {
            tx_queue_capacity: 4,
            ..LinkConfig::default()
        };
        let (link, _isr) = Link::new(port, config);

        // First byte kicks off the port, next 4 fill the queue, the rest of
        // the 8-byte wire frame (FLAG + 3 payload + 2 FCS + FLAG) drops.
        link.send(&[0x01, 0x02, 0x03]);
        assert_eq!(link.stats().tx_bytes_dropped, 3);
    }

    #[test]
    fn test_rx_overflow_counted() {
        let (port, handles) = stub_port();
        let config = LinkConfig {
            rx_queue_capacity: 2,
            ..LinkConfig::default()
        };
        let (link, isr) = Link::new(port, config);

        inject(&handles, &isr, &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(link.stats().rx_bytes_dropped, 2);
        let mut buffer = [0u8; 8];
        assert_eq!(link.receive_raw(&mut buffer), 2);
        assert_eq!(&buffer[..2], &[0x01, 0x02]);
    }

    #[test]
    fn test_raw_passthrough() {
        let (port, handles) = stub_port();
        let (link, isr) = Link::new(port, LinkConfig::default());

        // Raw bytes go out unframed and unescaped, through the same pump.
        link.send_raw(&[0x7E, 0x7D, 0x55]);
        while link.is_busy() {
            isr.on_byte_sent();
        }
        assert_eq!(
            handles.written.lock().unwrap().as_slice(),
            &[0x7E, 0x7D, 0x55]
        );

        // Inbound raw bytes come back verbatim too.
        inject(&handles, &isr, &[0xDE, 0xAD]);
        let mut buffer = [0u8; 8];
        assert_eq!(link.receive_raw(&mut buffer), 2);
        assert_eq!(&buffer[..2], &[0xDE, 0xAD]);
    }

    #[test]
    fn test_deinit_clears_state() {
        let (port, handles) = stub_port();
        let (mut link, isr) = Link::new(port, LinkConfig::default());

        link.send(&[0x01, 0x02, 0x03]);
        // Park half a frame in the reassembler.
        inject(&handles, &isr, &[0x7E, 0x11, 0x22]);
        let mut buffer = [0u8; 8];
        assert_eq!(link.receive(&mut buffer), 0);
        link.deinit();

        assert!(!link.is_busy());
        assert_eq!(link.receive(&mut buffer), 0);

        // A fresh frame decodes cleanly after reinitialization.
        inject(&handles, &isr, &encode(&[0x33, 0x44, 0x55]));
        assert_eq!(link.receive(&mut buffer), 3);
        assert_eq!(&buffer[..3], &[0x33, 0x44, 0x55]);
    }

    #[test]
    fn test_reset_requests_platform_reset() {
        let (port, handles) = stub_port();
        let config = LinkConfig {
            reset_drain: Duration::from_millis(1),
            ..LinkConfig::default()
        };
        let (link, _isr) = Link::new(port, config);

        link.reset();
        assert_eq!(*handles.resets.lock().unwrap(), 1);
    }
}
