//! Error types for the packet codec.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid cable number: {0}. Must be below 16")]
    InvalidCableNumber(u8),

    #[error("Invalid MIDI message: {:02x} {:02x} {:02x}", .0[0], .0[1], .0[2])]
    InvalidMidiMessage([u8; 3]),

    #[error("Invalid code index number: {0:#x}")]
    InvalidCin(u8),
}

pub type Result<T> = core::result::Result<T, CodecError>;
