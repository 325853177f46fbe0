//! Sysex chunking transmitter.
//!
//! Splits one logical sysex message into 3-byte chunks and sends one packet
//! (or one full bulk transfer, see [`SysexTransmitter::send_batch`]) per
//! transport-ready signal. The transmitter never loops on its own; whoever
//! owns the transport calls back in when the endpoint frees up.

use std::time::Instant;

use usb_midi_packet::{encode, UsbMidiPacket, MAX_CABLES, PACKET_SIZE, SYSEX_END, SYSEX_START};

use super::source::SysexSource;
use crate::error::{Error, Result};
use crate::stats::TransferStats;
use crate::transport::{Transport, MIDI_IN_ENDPOINT};
use crate::tx_buffer::TxBuffer;

/// Outcome of one ready signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxProgress {
    /// Packet(s) written; more to come.
    Sent { bytes_sent: usize, total_len: usize },
    /// The final packet was written and the transmitter is idle again.
    Complete(TransferStats),
}

impl TxProgress {
    #[inline]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

struct Transmission {
    total_len: usize,
    bytes_sent: usize,
    source: Box<dyn SysexSource>,
    started: Instant,
}

/// Chunk starting at `position`, encoded for `cable`.
fn packet_at(cable: u8, tx: &Transmission, position: usize) -> Result<UsbMidiPacket> {
    let count = (tx.total_len - position).min(3);
    let mut chunk = [0u8; 3];

    for (offset, slot) in chunk[..count].iter_mut().enumerate() {
        let at = position + offset;
        *slot = if at == 0 {
            SYSEX_START
        } else if at == tx.total_len - 1 {
            SYSEX_END
        } else {
            let byte = tx
                .source
                .payload_byte(at)
                .ok_or(Error::SourceExhausted { position: at })?;
            if byte >= 0x80 {
                return Err(Error::InvalidSysexByte { position: at, byte });
            }
            byte
        };
    }

    let packet = encode(chunk, cable)?;
    debug_assert_eq!(packet.num_midi_bytes(), count);
    Ok(packet)
}

/// Per-cable transmit state: idle, or sending one message.
pub struct SysexTransmitter {
    cable: u8,
    active: Option<Transmission>,
}

impl SysexTransmitter {
    pub fn new(cable: u8) -> Result<Self> {
        if cable >= MAX_CABLES {
            return Err(usb_midi_packet::CodecError::InvalidCableNumber(cable).into());
        }
        Ok(Self {
            cable,
            active: None,
        })
    }

    #[inline]
    pub fn cable(&self) -> u8 {
        self.cable
    }

    #[inline]
    pub fn is_sending(&self) -> bool {
        self.active.is_some()
    }

    /// Bytes of the current message already written (0 when idle).
    pub fn bytes_sent(&self) -> usize {
        self.active.as_ref().map_or(0, |tx| tx.bytes_sent)
    }

    pub fn total_len(&self) -> Option<usize> {
        self.active.as_ref().map(|tx| tx.total_len)
    }

    /// Begin sending a `total_len`-byte message (framing included). Nothing
    /// is written until the first ready signal.
    pub fn start<S: SysexSource + 'static>(&mut self, total_len: usize, source: S) -> Result<()> {
        if self.active.is_some() {
            return Err(Error::TransmissionInProgress { cable: self.cable });
        }
        if total_len < 2 {
            return Err(Error::SysexTooShort { len: total_len });
        }
        if source.total_len().is_some_and(|len| len != total_len) {
            return Err(Error::InvalidSysex("Length does not match source"));
        }

        tracing::debug!("sysex tx start | cable {} | {} bytes", self.cable, total_len);
        self.active = Some(Transmission {
            total_len,
            bytes_sent: 0,
            source: Box::new(source),
            started: Instant::now(),
        });
        Ok(())
    }

    /// The packet the next ready signal would send, without sending it.
    pub fn next_packet(&self) -> Result<Option<UsbMidiPacket>> {
        match &self.active {
            Some(tx) => packet_at(self.cable, tx, tx.bytes_sent).map(Some),
            None => Ok(None),
        }
    }

    /// Send exactly one packet. The position only advances if the transport
    /// accepted all 4 bytes, so a failed call can simply be repeated.
    pub fn on_transport_ready<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<TxProgress> {
        let tx = self
            .active
            .as_ref()
            .ok_or(Error::NoTransmission { cable: self.cable })?;
        let packet = packet_at(self.cable, tx, tx.bytes_sent)?;

        tracing::debug!("{}", packet);
        let written = transport
            .write(MIDI_IN_ENDPOINT, packet.as_bytes())
            .map_err(Error::TransportWrite)?;
        if written != PACKET_SIZE {
            return Err(Error::ShortWrite {
                written,
                expected: PACKET_SIZE,
            });
        }

        Ok(self.advance(packet.num_midi_bytes()))
    }

    /// Queue chunks from the current position until the buffer is full or
    /// the message is complete. Returns the message bytes queued.
    ///
    /// Does not advance; [`send_batch`](Self::send_batch) does that once the
    /// transfer succeeds.
    pub fn fill(&self, buffer: &mut TxBuffer) -> Result<usize> {
        let Some(tx) = &self.active else {
            return Ok(0);
        };

        let mut position = tx.bytes_sent;
        while position < tx.total_len && !buffer.is_full() {
            let packet = packet_at(self.cable, tx, position)?;
            buffer.push_packet(packet)?;
            position += packet.num_midi_bytes();
        }
        Ok(position - tx.bytes_sent)
    }

    /// Fill `buffer` and send it as one transfer.
    ///
    /// Packets already in `buffer` go out ahead of the sysex chunks. On any
    /// failure the buffer is cleared and the position is left unchanged.
    pub fn send_batch<T: Transport + ?Sized>(
        &mut self,
        buffer: &mut TxBuffer,
        transport: &mut T,
    ) -> Result<TxProgress> {
        if self.active.is_none() {
            return Err(Error::NoTransmission { cable: self.cable });
        }

        let sent = self.fill(buffer).and_then(|staged| {
            buffer.send(transport)?;
            Ok(staged)
        });
        match sent {
            Ok(staged) => Ok(self.advance(staged)),
            Err(e) => {
                buffer.clear();
                Err(e)
            }
        }
    }

    /// Drop the current message. Returns how many bytes had been sent, or
    /// `None` if idle.
    pub fn abort(&mut self) -> Option<usize> {
        let tx = self.active.take()?;
        tracing::info!(
            "sysex tx aborted | cable {} | {} of {} bytes sent",
            self.cable,
            tx.bytes_sent,
            tx.total_len
        );
        Some(tx.bytes_sent)
    }

    fn advance(&mut self, count: usize) -> TxProgress {
        let Some(tx) = self.active.as_mut() else {
            return TxProgress::Sent {
                bytes_sent: 0,
                total_len: 0,
            };
        };

        tx.bytes_sent += count;
        if tx.bytes_sent < tx.total_len {
            return TxProgress::Sent {
                bytes_sent: tx.bytes_sent,
                total_len: tx.total_len,
            };
        }

        let stats = TransferStats::new(self.cable, tx.total_len, tx.started.elapsed());
        self.active = None;
        tracing::info!("sysex tx done | {}", stats);
        TxProgress::Complete(stats)
    }
}

impl std::fmt::Debug for SysexTransmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysexTransmitter")
            .field("cable", &self.cable)
            .field("bytes_sent", &self.bytes_sent())
            .field("total_len", &self.total_len())
            .finish()
    }
}
