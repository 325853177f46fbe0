//! Error types for the streaming layer.

use thiserror::Error;
use usb_midi_packet::CodecError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Transport write failed: {0}")]
    TransportWrite(#[source] TransportError),

    #[error("Transport read failed: {0}")]
    TransportRead(#[source] TransportError),

    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("Sysex transmission already in progress on cable {cable}")]
    TransmissionInProgress { cable: u8 },

    #[error("No sysex transmission in progress on cable {cable}")]
    NoTransmission { cable: u8 },

    #[error("Sysex too short: {len} bytes. Must be at least 2")]
    SysexTooShort { len: usize },

    #[error("Invalid sysex message: {0}")]
    InvalidSysex(&'static str),

    #[error("Invalid sysex byte {byte:#04x} at position {position}")]
    InvalidSysexByte { position: usize, byte: u8 },

    #[error("Sysex source exhausted at position {position}")]
    SourceExhausted { position: usize },

    #[error("Cable {cable} out of range ({count} cables configured)")]
    CableOutOfRange { cable: u8, count: u8 },

    #[error("USB MIDI device not available")]
    Unavailable,

    #[error("Transmit buffer full")]
    BufferFull,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Failure reported by a [`Transport`](crate::Transport) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("endpoint {0:#04x} not ready")]
    NotReady(u8),

    #[error("endpoint {0:#04x} stalled")]
    Stalled(u8),

    #[error("device disconnected")]
    Disconnected,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
