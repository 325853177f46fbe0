//! USB-MIDI device: transport events in, packets out.
//!
//! ## Quick Start
//!
//! ```
//! use usb_midi_stream::{memory_transport, TransportEvent, UsbMidiDevice, UsbStatus};
//!
//! let (transport, mut host) = memory_transport(256);
//! let device = UsbMidiDevice::builder()
//!     .capture_limit(1024)
//!     .on_sysex_received(|summary| println!("sysex: {} bytes", summary.byte_count))
//!     .build(transport)?;
//!
//! // The USB stack reports status and completed transfers through the channel
//! let events = device.event_sender();
//! events.send(TransportEvent::Status(UsbStatus::Configured)).unwrap();
//! device.process_events()?;
//!
//! device.start_sysex_buffer(0, &[0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7])?;
//! events.send(TransportEvent::PacketSent).unwrap();
//! device.process_events()?;
//!
//! assert_eq!(host.drain().len(), 2);
//! # Ok::<(), usb_midi_stream::Error>(())
//! ```

mod builder;

pub use builder::{DeviceBuilder, DeviceConfig, DEFAULT_MAX_PACKET_SIZE};

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use usb_midi_packet::{decode, encode, events, CodeIndex, PacketHandler, PACKET_SIZE};

use crate::error::{Error, Result};
use crate::status::{Availability, UsbStatus};
use crate::sysex::{
    CableTransmitters, SysexBuffer, SysexReceiver, SysexSource, SysexSummary, SysexTransmitter,
    TxProgress,
};
use crate::transport::{Transport, TransportEvent, MIDI_IN_ENDPOINT, MIDI_OUT_ENDPOINT};
use crate::tx_buffer::TxBuffer;

pub(crate) type AvailabilityCallback = Box<dyn FnMut(bool) + Send>;
pub(crate) type SysexCallback = Box<dyn FnMut(SysexSummary) + Send>;

/// Pending transport events beyond this are refused by `try_send`.
const EVENT_QUEUE_CAPACITY: usize = 1024;

// ============================================================================
// UsbMidiDevice - Main Entry Point
// ============================================================================

/// A USB-MIDI function on top of a [`Transport`].
///
/// Clone is cheap (Arc internally); clones share all state, so the transport
/// driver and the application can each hold one.
pub struct UsbMidiDevice<T: Transport> {
    inner: Arc<DeviceInner<T>>,
}

impl<T: Transport> Clone for UsbMidiDevice<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct DeviceInner<T> {
    config: DeviceConfig,
    // Lock order: transmitter, then tx_buffer, then transport
    transport: Mutex<T>,
    transmitters: CableTransmitters,
    tx_buffer: Mutex<TxBuffer>,
    availability: Availability,
    // User callbacks never run while `receiver` is locked
    receiver: Mutex<SysexReceiver>,
    finished: Arc<Mutex<Vec<SysexSummary>>>,
    handler: Mutex<Option<Box<dyn PacketHandler + Send>>>,
    on_sysex_received: Mutex<Option<SysexCallback>>,
    on_available: Mutex<Option<AvailabilityCallback>>,
    events_tx: Sender<TransportEvent>,
    events_rx: Receiver<TransportEvent>,
}

impl<T: Transport> UsbMidiDevice<T> {
    pub fn builder() -> DeviceBuilder<T> {
        DeviceBuilder::default()
    }

    fn from_builder(builder: DeviceBuilder<T>, transport: T) -> Result<Self> {
        let DeviceBuilder {
            config,
            handler,
            on_available,
            on_sysex_received,
            ..
        } = builder;

        let finished = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&finished);
        let receiver = SysexReceiver::new(config.capture_limit)
            .on_complete(move |summary| sink.lock().push(summary));
        let (events_tx, events_rx) = crossbeam_channel::bounded(EVENT_QUEUE_CAPACITY);

        Ok(Self {
            inner: Arc::new(DeviceInner {
                transmitters: CableTransmitters::new(config.output_cables)?,
                tx_buffer: Mutex::new(TxBuffer::new(config.max_packet_size)),
                transport: Mutex::new(transport),
                availability: Availability::new(),
                receiver: Mutex::new(receiver),
                finished,
                handler: Mutex::new(handler),
                on_sysex_received: Mutex::new(on_sysex_received),
                on_available: Mutex::new(on_available),
                events_tx,
                events_rx,
                config,
            }),
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.inner.availability.is_available()
    }

    /// Run `f` with exclusive access to the transport.
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.inner.transport.lock())
    }

    fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(Error::Unavailable)
        }
    }

    // ==================== Transmit ====================

    /// Encode one message and write it to the IN endpoint.
    ///
    /// While a sysex transmission is running on `cable` only real-time
    /// messages are accepted there.
    pub fn send(&self, cable: u8, midi_bytes: [u8; 3]) -> Result<()> {
        self.ensure_available()?;
        let transmitter = self.inner.transmitters.lock(cable)?;

        let packet = encode(midi_bytes, cable).inspect_err(|e| {
            tracing::error!("Failed to encode {:02x?} on cable {}: {}", midi_bytes, cable, e);
        })?;
        if transmitter.is_sending() && packet.cin() != CodeIndex::SingleByte {
            return Err(Error::TransmissionInProgress { cable });
        }

        tracing::debug!("{}", packet);
        let written = self
            .inner
            .transport
            .lock()
            .write(MIDI_IN_ENDPOINT, packet.as_bytes())
            .map_err(Error::TransportWrite)?;
        if written != PACKET_SIZE {
            return Err(Error::ShortWrite {
                written,
                expected: PACKET_SIZE,
            });
        }
        Ok(())
    }

    /// Start a sysex transmission and send its first packet (or batch).
    ///
    /// If that first write fails the transmission is dropped again, so the
    /// cable is either sending with a packet in flight or idle.
    pub fn start_sysex<S: SysexSource + 'static>(
        &self,
        cable: u8,
        total_len: usize,
        source: S,
    ) -> Result<TxProgress> {
        self.ensure_available()?;
        let mut transmitter = self.inner.transmitters.lock(cable)?;
        transmitter.start(total_len, source)?;

        self.pump(&mut transmitter).inspect_err(|e| {
            tracing::warn!("sysex tx on cable {} failed to start: {}", cable, e);
            transmitter.abort();
        })
    }

    /// Start sending a complete `F0 ... F7` message.
    pub fn start_sysex_buffer(&self, cable: u8, message: &[u8]) -> Result<TxProgress> {
        let buffer = SysexBuffer::new(message)?;
        self.start_sysex(cable, message.len(), buffer)
    }

    /// Returns the bytes sent before the abort, `None` if the cable was idle.
    pub fn abort_sysex(&self, cable: u8) -> Result<Option<usize>> {
        let aborted = self.inner.transmitters.abort(cable)?;
        if aborted.is_some() && self.inner.config.batch_transfers {
            self.inner.tx_buffer.lock().clear();
        }
        Ok(aborted)
    }

    pub fn is_sending(&self, cable: u8) -> bool {
        self.inner.transmitters.is_sending(cable)
    }

    /// The transport finished the previous IN transfer. Sends the next chunk
    /// of the next sending cable in round-robin order; `None` if nothing is
    /// being sent.
    ///
    /// A failed write leaves the position unchanged, so calling this again
    /// retries the same chunk.
    pub fn on_packet_sent(&self) -> Result<Option<TxProgress>> {
        let Some(mut transmitter) = self.inner.transmitters.next_sending() else {
            return Ok(None);
        };

        self.pump(&mut transmitter)
            .inspect_err(|e| {
                tracing::warn!("sysex tx on cable {} failed: {}", transmitter.cable(), e);
            })
            .map(Some)
    }

    fn pump(&self, transmitter: &mut SysexTransmitter) -> Result<TxProgress> {
        if self.inner.config.batch_transfers {
            let mut buffer = self.inner.tx_buffer.lock();
            let mut transport = self.inner.transport.lock();
            transmitter.send_batch(&mut buffer, &mut *transport)
        } else {
            let mut transport = self.inner.transport.lock();
            transmitter.on_transport_ready(&mut *transport)
        }
    }

    // ==================== Receive ====================

    /// Read and dispatch packets until the OUT endpoint is empty. Returns the
    /// number of packets dispatched.
    ///
    /// Handlers and the `on_sysex_received` callback run on the calling
    /// thread after the reception state is unlocked. They may call any other
    /// device method, but not `poll_rx` or `process_events`.
    ///
    /// A short read is logged and dropped; reading continues with the next
    /// packet.
    pub fn poll_rx(&self) -> Result<usize> {
        let mut dispatched = 0;
        loop {
            let mut bytes = [0u8; PACKET_SIZE];
            let read = self
                .inner
                .transport
                .lock()
                .read(MIDI_OUT_ENDPOINT, &mut bytes)
                .map_err(Error::TransportRead)?;

            match read {
                0 => break,
                PACKET_SIZE => {
                    if self.receive(bytes) {
                        dispatched += 1;
                    }
                }
                partial => tracing::warn!("Dropping {} byte partial packet", partial),
            }
        }
        Ok(dispatched)
    }

    fn receive(&self, bytes: [u8; PACKET_SIZE]) -> bool {
        let packet = match decode(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!("Packet parsing failed: {} ({:02x?})", e, bytes);
                return false;
            }
        };
        tracing::debug!("{}", packet);

        if packet.cable_num() >= self.inner.config.input_cables {
            tracing::warn!(
                "Dropping packet for cable {} ({} input cables)",
                packet.cable_num(),
                self.inner.config.input_cables
            );
            return false;
        }

        let packet_events = events(&packet);
        {
            let mut receiver = self.inner.receiver.lock();
            for event in &packet_events {
                receiver.handle_event(event);
            }
        }

        if let Some(handler) = self.inner.handler.lock().as_mut() {
            for event in &packet_events {
                handler.handle_event(event);
            }
        }

        let finished = std::mem::take(&mut *self.inner.finished.lock());
        if !finished.is_empty() {
            if let Some(f) = self.inner.on_sysex_received.lock().as_mut() {
                for summary in finished {
                    f(summary);
                }
            }
        }
        true
    }

    /// Sysex messages received completely so far.
    pub fn sysex_received(&self) -> usize {
        self.inner.receiver.lock().completed()
    }

    // ==================== Status ====================

    /// Apply a USB status notification. Returns the new availability when it
    /// changed.
    ///
    /// Losing availability aborts every sysex transmission and drops any
    /// half-received sysex.
    ///
    /// The `on_available` callback runs unlocked and may call back into the
    /// device. A change it triggers itself is applied but not reported to it.
    pub fn handle_status(&self, status: UsbStatus) -> Option<bool> {
        let available = self.inner.availability.update(status)?;

        if !available {
            let aborted = self.inner.transmitters.abort_all();
            self.inner.tx_buffer.lock().clear();
            self.inner.receiver.lock().reset();
            if aborted > 0 {
                tracing::warn!("Aborted {} sysex transmission(s) on suspend", aborted);
            }
        }

        let callback = self.inner.on_available.lock().take();
        if let Some(mut f) = callback {
            f(available);
            self.inner.on_available.lock().get_or_insert(f);
        }
        Some(available)
    }

    // ==================== Event Loop ====================

    /// Sender for the transport driver. Use `try_send` from interrupt-like
    /// contexts; the queue is bounded.
    pub fn event_sender(&self) -> Sender<TransportEvent> {
        self.inner.events_tx.clone()
    }

    /// Handle every queued transport event without blocking. Returns the
    /// number handled.
    ///
    /// Stops at the first error; later events stay queued for the next call.
    pub fn process_events(&self) -> Result<usize> {
        let mut processed = 0;
        while let Ok(event) = self.inner.events_rx.try_recv() {
            processed += 1;
            match event {
                TransportEvent::PacketSent => {
                    self.on_packet_sent()?;
                }
                TransportEvent::Status(status) => {
                    self.handle_status(status);
                }
                TransportEvent::DataReceived => {
                    self.poll_rx()?;
                }
            }
        }
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::sysex::SysexGenerator;
    use crate::transport::{memory_transport, HostEnd, MemoryTransport};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;
    use usb_midi_packet::Handlers;

    fn device(builder: DeviceBuilder<MemoryTransport>) -> (UsbMidiDevice<MemoryTransport>, HostEnd) {
        let (transport, host) = memory_transport(4096);
        let device = builder.build(transport).unwrap();
        device.handle_status(UsbStatus::Configured);
        (device, host)
    }

    fn drive<T: Transport>(device: &UsbMidiDevice<T>) {
        while device.on_packet_sent().unwrap().is_some() {}
    }

    #[test]
    fn test_send_writes_packet() {
        let (device, mut host) = device(UsbMidiDevice::builder().output_cables(2));
        device.send(1, [0x90, 0x45, 0x7F]).unwrap();
        assert_eq!(host.drain(), vec![[0x19, 0x90, 0x45, 0x7F]]);
    }

    #[test]
    fn test_send_requires_availability() {
        let (transport, host) = memory_transport(16);
        let device = UsbMidiDevice::builder().build(transport).unwrap();

        assert!(matches!(device.send(0, [0x90, 60, 100]), Err(Error::Unavailable)));
        assert!(matches!(
            device.start_sysex(0, 10, SysexGenerator::test_pattern()),
            Err(Error::Unavailable)
        ));
        assert_eq!(host.pending(), 0);
    }

    #[test]
    fn test_send_errors() {
        let (device, host) = device(UsbMidiDevice::builder().output_cables(2));

        assert!(matches!(
            device.send(2, [0x90, 60, 100]),
            Err(Error::CableOutOfRange { cable: 2, count: 2 })
        ));
        assert!(matches!(device.send(0, [0xF4, 0, 0]), Err(Error::Codec(_))));

        host.reject_next_writes(1);
        assert!(matches!(
            device.send(0, [0x90, 60, 100]),
            Err(Error::ShortWrite {
                written: 0,
                expected: 4
            })
        ));
    }

    #[test]
    fn test_send_during_sysex() {
        let (device, mut host) = device(UsbMidiDevice::builder().output_cables(2));
        device
            .start_sysex(0, 100, SysexGenerator::test_pattern())
            .unwrap();

        assert!(matches!(
            device.send(0, [0x90, 60, 100]),
            Err(Error::TransmissionInProgress { cable: 0 })
        ));
        // Real-time may interleave; other cables are unaffected
        device.send(0, [0xF8, 0, 0]).unwrap();
        device.send(1, [0x90, 60, 100]).unwrap();

        assert_eq!(host.drain().len(), 3);
    }

    #[test]
    fn test_start_sends_first_packet() {
        let (device, mut host) = device(UsbMidiDevice::builder());
        let progress = device
            .start_sysex(0, 9, SysexGenerator::test_pattern())
            .unwrap();

        assert_eq!(
            progress,
            TxProgress::Sent {
                bytes_sent: 3,
                total_len: 9
            }
        );
        assert_eq!(host.drain(), vec![[0x04, 0xF0, 0x01, 0x02]]);
    }

    #[test]
    fn test_failed_start_leaves_cable_idle() {
        let (device, host) = device(UsbMidiDevice::builder());
        host.fail_next_writes(1);

        assert!(matches!(
            device.start_sysex(0, 9, SysexGenerator::test_pattern()),
            Err(Error::TransportWrite(_))
        ));
        assert!(!device.is_sending(0));
        assert!(device.start_sysex(0, 9, SysexGenerator::test_pattern()).is_ok());
    }

    #[test]
    fn test_start_sysex_buffer_validates() {
        let (device, host) = device(UsbMidiDevice::builder());
        assert!(matches!(
            device.start_sysex_buffer(0, &[0xF0]),
            Err(Error::SysexTooShort { len: 1 })
        ));
        assert!(matches!(
            device.start_sysex_buffer(0, &[0xF0, 0x80, 0xF7]),
            Err(Error::InvalidSysexByte { position: 1, .. })
        ));
        assert_eq!(host.pending(), 0);
    }

    #[test]
    fn test_on_packet_sent_round_robin() {
        let (device, mut host) = device(UsbMidiDevice::builder().output_cables(3));
        device.start_sysex(0, 9, SysexGenerator::new(|_| 0x00)).unwrap();
        device.start_sysex(2, 9, SysexGenerator::new(|_| 0x22)).unwrap();
        host.drain();

        drive(&device);
        let cables: Vec<u8> = host.drain().iter().map(|p| p[0] >> 4).collect();
        assert_eq!(cables, [0, 2, 0, 2]);
        assert!(device.on_packet_sent().unwrap().is_none());
    }

    #[test]
    fn test_suspend_aborts_transmissions() {
        let (device, mut host) = device(UsbMidiDevice::builder().output_cables(2));
        device.start_sysex(0, 100, SysexGenerator::test_pattern()).unwrap();
        device.start_sysex(1, 100, SysexGenerator::test_pattern()).unwrap();

        assert_eq!(device.handle_status(UsbStatus::Suspend), Some(false));
        assert!(!device.is_sending(0));
        assert!(!device.is_sending(1));

        host.drain();
        assert!(device.on_packet_sent().unwrap().is_none());
        assert_eq!(host.pending(), 0);
    }

    #[test]
    fn test_availability_callback_fires_on_edges() {
        let edges = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&edges);
        let (transport, _host) = memory_transport(16);
        let device = UsbMidiDevice::builder()
            .on_available(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build(transport)
            .unwrap();

        for status in [
            UsbStatus::Reset,
            UsbStatus::Configured,
            UsbStatus::Configured,
            UsbStatus::Sof,
            UsbStatus::Suspend,
            UsbStatus::Resume,
            UsbStatus::Configured,
        ] {
            device.handle_status(status);
        }
        assert_eq!(edges.load(Ordering::SeqCst), 3);
        assert!(device.is_available());
    }

    #[test]
    fn test_poll_rx_dispatches() {
        let notes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notes);
        let (device, mut host) = device(
            UsbMidiDevice::builder()
                .input_cables(2)
                .handler(Handlers::new().message(move |bytes, _| {
                    if bytes[0] & 0xF0 == 0x90 {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                })),
        );

        host.send([0x09, 0x90, 60, 100]);
        host.send([0x19, 0x91, 61, 100]);
        // Reserved CIN, then a cable beyond the configured two
        host.send([0x00, 0x00, 0x00, 0x00]);
        host.send([0x29, 0x90, 62, 100]);

        assert_eq!(device.poll_rx().unwrap(), 2);
        assert_eq!(notes.load(Ordering::SeqCst), 2);
        assert_eq!(device.poll_rx().unwrap(), 0);
    }

    #[test]
    fn test_poll_rx_read_failure() {
        let (device, mut host) = device(UsbMidiDevice::builder());
        host.send([0x09, 0x90, 60, 100]);
        host.fail_next_reads(1);

        assert!(matches!(
            device.poll_rx(),
            Err(Error::TransportRead(TransportError::NotReady(MIDI_OUT_ENDPOINT)))
        ));
        // Nothing was consumed by the failed read
        assert_eq!(device.poll_rx().unwrap(), 1);
    }

    #[test]
    fn test_poll_rx_drops_partial_packet() {
        let notes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&notes);
        let (device, mut host) = device(UsbMidiDevice::builder().handler(
            Handlers::new().message(move |bytes, _| sink.lock().push(bytes[1])),
        ));

        host.send([0x09, 0x90, 60, 100]);
        host.send([0x09, 0x90, 61, 100]);
        host.truncate_next_reads(1);

        assert_eq!(device.poll_rx().unwrap(), 1);
        assert_eq!(*notes.lock(), [61]);
    }

    #[test]
    fn test_receive_callbacks_may_query_device() {
        let slot: Arc<OnceLock<UsbMidiDevice<MemoryTransport>>> = Arc::new(OnceLock::new());
        let from_handler = Arc::new(Mutex::new(Vec::new()));
        let from_sysex = Arc::new(Mutex::new(Vec::new()));

        let (handler_slot, handler_sink) = (Arc::clone(&slot), Arc::clone(&from_handler));
        let (sysex_slot, sysex_sink) = (Arc::clone(&slot), Arc::clone(&from_sysex));
        let (transport, mut host) = memory_transport(16);
        let device = UsbMidiDevice::builder()
            .handler(Handlers::new().message(move |_, _| {
                if let Some(device) = handler_slot.get() {
                    handler_sink.lock().push(device.sysex_received());
                }
            }))
            .on_sysex_received(move |_| {
                if let Some(device) = sysex_slot.get() {
                    sysex_sink.lock().push(device.sysex_received());
                }
            })
            .build(transport)
            .unwrap();
        assert!(slot.set(device.clone()).is_ok());
        device.handle_status(UsbStatus::Configured);

        host.send([0x07, 0xF0, 0x01, 0xF7]);
        host.send([0x09, 0x90, 60, 100]);

        assert_eq!(device.poll_rx().unwrap(), 2);
        assert_eq!(*from_sysex.lock(), [1]);
        assert_eq!(*from_handler.lock(), [1]);
    }

    #[test]
    fn test_availability_callback_may_change_status() {
        let slot: Arc<OnceLock<UsbMidiDevice<MemoryTransport>>> = Arc::new(OnceLock::new());
        let edges = Arc::new(Mutex::new(Vec::new()));

        let (callback_slot, sink) = (Arc::clone(&slot), Arc::clone(&edges));
        let (transport, _host) = memory_transport(16);
        let device = UsbMidiDevice::builder()
            .on_available(move |available| {
                sink.lock().push(available);
                if !available {
                    if let Some(device) = callback_slot.get() {
                        device.handle_status(UsbStatus::Configured);
                    }
                }
            })
            .build(transport)
            .unwrap();
        assert!(slot.set(device.clone()).is_ok());

        assert_eq!(device.handle_status(UsbStatus::Configured), Some(true));
        assert_eq!(device.handle_status(UsbStatus::Suspend), Some(false));

        // The nested change applies but is not reported back to the callback
        assert!(device.is_available());
        assert_eq!(*edges.lock(), [true, false]);

        assert_eq!(device.handle_status(UsbStatus::Suspend), Some(false));
        assert_eq!(*edges.lock(), [true, false, false]);
    }

    #[test]
    fn test_process_events() {
        let (transport, mut host) = memory_transport(64);
        let device = UsbMidiDevice::builder().build(transport).unwrap();
        let events = device.event_sender();

        events.send(TransportEvent::Status(UsbStatus::Configured)).unwrap();
        assert_eq!(device.process_events().unwrap(), 1);

        device.start_sysex(0, 7, SysexGenerator::test_pattern()).unwrap();
        events.send(TransportEvent::PacketSent).unwrap();
        events.send(TransportEvent::PacketSent).unwrap();
        host.send([0x0F, 0xF8, 0x00, 0x00]);
        events.send(TransportEvent::DataReceived).unwrap();

        assert_eq!(device.process_events().unwrap(), 3);
        assert!(!device.is_sending(0));
        assert_eq!(host.drain().len(), 3);
    }

    #[test]
    fn test_batch_transfers() {
        let (device, mut host) = device(
            UsbMidiDevice::builder()
                .max_packet_size(16)
                .batch_transfers(true),
        );
        device.start_sysex(0, 20, SysexGenerator::test_pattern()).unwrap();
        drive(&device);

        // 7 packets, 4 per transfer
        assert_eq!(host.transfers(), 2);
        assert_eq!(host.drain().len(), 7);
    }
}
