//! In-memory loopback transport.
//!
//! [`memory_transport`] returns the device side ([`MemoryTransport`]) and the
//! host side ([`HostEnd`]) of a pair of lock-free packet queues. The host side
//! can also make the next reads or writes fail, to exercise error paths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use usb_midi_packet::{UsbMidiPacket, PACKET_SIZE};

use super::{Transport, MIDI_IN_ENDPOINT, MIDI_OUT_ENDPOINT};
use crate::error::TransportError;

type RawPacket = [u8; PACKET_SIZE];

#[derive(Debug, Default)]
struct Control {
    fail_writes: AtomicUsize,
    reject_writes: AtomicUsize,
    fail_reads: AtomicUsize,
    short_reads: AtomicUsize,
    transfers: AtomicUsize,
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .is_ok()
}

/// Create a connected device/host pair, each direction holding up to
/// `capacity` packets.
pub fn memory_transport(capacity: usize) -> (MemoryTransport, HostEnd) {
    let (to_host, from_device) = HeapRb::<RawPacket>::new(capacity).split();
    let (to_device, from_host) = HeapRb::<RawPacket>::new(capacity).split();
    let control = Arc::new(Control::default());

    (
        MemoryTransport {
            to_host,
            from_host,
            control: Arc::clone(&control),
        },
        HostEnd {
            from_device,
            to_device,
            control,
        },
    )
}

/// Device side of [`memory_transport`].
///
/// Writes are all-or-nothing: a transfer that does not fit in the queue is
/// refused with [`TransportError::NotReady`].
pub struct MemoryTransport {
    to_host: HeapProd<RawPacket>,
    from_host: HeapCons<RawPacket>,
    control: Arc<Control>,
}

impl Transport for MemoryTransport {
    fn write(&mut self, endpoint: u8, bytes: &[u8]) -> Result<usize, TransportError> {
        if endpoint != MIDI_IN_ENDPOINT {
            return Err(TransportError::Stalled(endpoint));
        }
        if bytes.len() % PACKET_SIZE != 0 {
            return Err(TransportError::Other(format!(
                "{} byte write is not a whole number of packets",
                bytes.len()
            )));
        }
        if take_one(&self.control.fail_writes) {
            return Err(TransportError::NotReady(endpoint));
        }
        if take_one(&self.control.reject_writes) {
            return Ok(0);
        }

        let count = bytes.len() / PACKET_SIZE;
        if self.to_host.vacant_len() < count {
            return Err(TransportError::NotReady(endpoint));
        }
        let pushed = self
            .to_host
            .push_iter(bytes.chunks_exact(PACKET_SIZE).map(|chunk| {
                let mut packet = [0u8; PACKET_SIZE];
                packet.copy_from_slice(chunk);
                packet
            }));
        if pushed != count {
            return Err(TransportError::Other(format!(
                "queued {} of {} packets",
                pushed, count
            )));
        }

        self.control.transfers.fetch_add(1, Ordering::AcqRel);
        Ok(bytes.len())
    }

    fn read(&mut self, endpoint: u8, buf: &mut [u8]) -> Result<usize, TransportError> {
        if endpoint != MIDI_OUT_ENDPOINT {
            return Err(TransportError::Stalled(endpoint));
        }
        if buf.len() < PACKET_SIZE {
            return Err(TransportError::Other(format!(
                "read buffer of {} bytes is smaller than a packet",
                buf.len()
            )));
        }

        if take_one(&self.control.fail_reads) {
            return Err(TransportError::NotReady(endpoint));
        }

        match self.from_host.try_pop() {
            Some(packet) => {
                let len = if take_one(&self.control.short_reads) {
                    PACKET_SIZE / 2
                } else {
                    PACKET_SIZE
                };
                buf[..len].copy_from_slice(&packet[..len]);
                Ok(len)
            }
            None => Ok(0),
        }
    }
}

/// Host side of [`memory_transport`].
pub struct HostEnd {
    from_device: HeapCons<RawPacket>,
    to_device: HeapProd<RawPacket>,
    control: Arc<Control>,
}

impl HostEnd {
    /// Queue raw packet bytes for the device. Returns `false` if the queue is full.
    #[inline]
    pub fn send(&mut self, packet: RawPacket) -> bool {
        self.to_device.try_push(packet).is_ok()
    }

    #[inline]
    pub fn send_packet(&mut self, packet: &UsbMidiPacket) -> bool {
        self.send(*packet.as_bytes())
    }

    #[inline]
    pub fn recv(&mut self) -> Option<RawPacket> {
        self.from_device.try_pop()
    }

    pub fn drain(&mut self) -> Vec<RawPacket> {
        let mut packets = Vec::with_capacity(self.from_device.occupied_len());
        while let Some(packet) = self.from_device.try_pop() {
            packets.push(packet);
        }
        packets
    }

    /// Packets written by the device and not yet received.
    #[inline]
    pub fn pending(&self) -> usize {
        self.from_device.occupied_len()
    }

    /// Number of successful device writes so far. A batched write counts once.
    #[inline]
    pub fn transfers(&self) -> usize {
        self.control.transfers.load(Ordering::Acquire)
    }

    /// The next `count` device writes fail with [`TransportError::NotReady`].
    pub fn fail_next_writes(&self, count: usize) {
        self.control.fail_writes.store(count, Ordering::Release);
    }

    /// The next `count` device writes accept nothing and report 0 bytes written.
    pub fn reject_next_writes(&self, count: usize) {
        self.control.reject_writes.store(count, Ordering::Release);
    }

    /// The next `count` device reads fail with [`TransportError::NotReady`].
    pub fn fail_next_reads(&self, count: usize) {
        self.control.fail_reads.store(count, Ordering::Release);
    }

    /// The next `count` packets the device reads arrive cut in half. The
    /// missing bytes are lost.
    pub fn truncate_next_reads(&self, count: usize) {
        self.control.short_reads.store(count, Ordering::Release);
    }
}
