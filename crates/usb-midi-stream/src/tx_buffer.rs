//! Multi-packet transmit buffer: several packets, one bulk transfer.

use smallvec::SmallVec;
use usb_midi_packet::{encode, UsbMidiPacket, PACKET_SIZE};

use crate::error::{Error, Result};
use crate::transport::{Transport, MIDI_IN_ENDPOINT};

/// 64-byte full-speed bulk endpoint.
const INLINE_PACKETS: usize = 16;

#[derive(Debug, Clone)]
pub struct TxBuffer {
    packets: SmallVec<[UsbMidiPacket; INLINE_PACKETS]>,
    capacity: usize,
}

impl TxBuffer {
    /// Room for as many packets as fit in one transfer of `max_packet_size` bytes.
    pub fn new(max_packet_size: usize) -> Self {
        Self::with_capacity((max_packet_size / PACKET_SIZE).max(1))
    }

    pub fn with_capacity(packets: usize) -> Self {
        let capacity = packets.max(1);
        Self {
            packets: SmallVec::with_capacity(capacity),
            capacity,
        }
    }

    /// Encode and queue one message.
    pub fn add(&mut self, cable_num: u8, midi_bytes: [u8; 3]) -> Result<()> {
        if self.is_full() {
            return Err(Error::BufferFull);
        }
        let packet = encode(midi_bytes, cable_num)?;
        self.packets.push(packet);
        Ok(())
    }

    pub fn push_packet(&mut self, packet: UsbMidiPacket) -> Result<()> {
        if self.is_full() {
            return Err(Error::BufferFull);
        }
        self.packets.push(packet);
        Ok(())
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.packets.len() >= self.capacity
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Queued packets.
    #[inline]
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn packets(&self) -> &[UsbMidiPacket] {
        &self.packets
    }

    pub fn clear(&mut self) {
        self.packets.clear();
    }

    /// Write every queued packet in a single transfer and clear the buffer.
    ///
    /// Returns the number of packets sent; an empty buffer writes nothing. On
    /// failure the packets stay queued.
    pub fn send<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<usize> {
        if self.packets.is_empty() {
            return Ok(0);
        }

        let mut bytes: SmallVec<[u8; INLINE_PACKETS * PACKET_SIZE]> =
            SmallVec::with_capacity(self.packets.len() * PACKET_SIZE);
        for packet in &self.packets {
            tracing::debug!("{}", packet);
            bytes.extend_from_slice(packet.as_bytes());
        }

        let written = transport
            .write(MIDI_IN_ENDPOINT, &bytes)
            .map_err(Error::TransportWrite)?;
        if written != bytes.len() {
            return Err(Error::ShortWrite {
                written,
                expected: bytes.len(),
            });
        }

        let count = self.packets.len();
        self.packets.clear();
        Ok(count)
    }
}
