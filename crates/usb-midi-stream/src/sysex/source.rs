//! Where the bytes of an outgoing sysex message come from.

use usb_midi_packet::{SYSEX_END, SYSEX_START};

use crate::error::{Error, Result};

/// Supplies the payload of a sysex message by position.
///
/// Position 0 is the `F0` and position `total_len - 1` the `F7`; the
/// transmitter writes those itself and only asks for the bytes in between.
/// Answers must be deterministic so a failed write can be retried.
pub trait SysexSource: Send {
    /// The byte at `position`, or `None` if the source has run out.
    fn payload_byte(&self, position: usize) -> Option<u8>;

    /// Total message length including framing, if the source knows it.
    fn total_len(&self) -> Option<usize> {
        None
    }
}

impl<S: SysexSource + ?Sized> SysexSource for Box<S> {
    fn payload_byte(&self, position: usize) -> Option<u8> {
        (**self).payload_byte(position)
    }

    fn total_len(&self) -> Option<usize> {
        (**self).total_len()
    }
}

/// A complete `F0 ... F7` message held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysexBuffer {
    bytes: Vec<u8>,
}

impl SysexBuffer {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() < 2 {
            return Err(Error::SysexTooShort { len: bytes.len() });
        }
        if bytes[0] != SYSEX_START {
            return Err(Error::InvalidSysex("Must start with 0xF0"));
        }
        if bytes[bytes.len() - 1] != SYSEX_END {
            return Err(Error::InvalidSysex("Must end with 0xF7"));
        }
        if let Some(offset) = bytes[1..bytes.len() - 1].iter().position(|&b| b >= 0x80) {
            return Err(Error::InvalidSysexByte {
                position: offset + 1,
                byte: bytes[offset + 1],
            });
        }
        Ok(Self { bytes })
    }

    /// Frame `payload` with `F0`/`F7`.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let mut bytes = Vec::with_capacity(payload.len() + 2);
        bytes.push(SYSEX_START);
        bytes.extend_from_slice(payload);
        bytes.push(SYSEX_END);
        Self::new(bytes)
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload without framing.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[1..self.bytes.len() - 1]
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl SysexSource for SysexBuffer {
    fn payload_byte(&self, position: usize) -> Option<u8> {
        self.bytes.get(position).copied()
    }

    fn total_len(&self) -> Option<usize> {
        Some(self.bytes.len())
    }
}

/// Open-ended source computing each payload byte from its position.
pub struct SysexGenerator<F> {
    generate: F,
}

impl<F> SysexGenerator<F>
where
    F: Fn(usize) -> u8 + Send,
{
    pub fn new(generate: F) -> Self {
        Self { generate }
    }
}

impl SysexGenerator<fn(usize) -> u8> {
    /// `position % 128`: a recognisable ramp that is always a valid data byte.
    pub fn test_pattern() -> Self {
        Self {
            generate: |position| (position % 128) as u8,
        }
    }
}

impl<F> SysexSource for SysexGenerator<F>
where
    F: Fn(usize) -> u8 + Send,
{
    #[inline]
    fn payload_byte(&self, position: usize) -> Option<u8> {
        Some((self.generate)(position))
    }
}

impl<F> std::fmt::Debug for SysexGenerator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysexGenerator").finish_non_exhaustive()
    }
}
