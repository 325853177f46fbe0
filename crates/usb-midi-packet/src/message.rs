//! Raw 1-3 byte MIDI messages and MIDI byte classification.

use midi_msg::MidiMsg;
use serde::{Deserialize, Serialize};

pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

/// What a single byte means on the MIDI wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteClass {
    /// `0x00..=0x7F`
    Data,
    /// Channel voice status; carries the high nibble (`0x8..=0xE`).
    ChannelVoice(u8),
    /// `0xF0`
    SysexStart,
    /// `0xF7`
    SysexEnd,
    /// Any other `0xF_` status byte, defined or not.
    System(u8),
}

impl ByteClass {
    #[inline]
    pub const fn of(byte: u8) -> Self {
        match byte {
            0x00..=0x7F => Self::Data,
            0x80..=0xEF => Self::ChannelVoice(byte >> 4),
            SYSEX_START => Self::SysexStart,
            SYSEX_END => Self::SysexEnd,
            other => Self::System(other),
        }
    }

    #[inline]
    pub const fn is_data(self) -> bool {
        matches!(self, Self::Data)
    }
}

/// One MIDI wire message of 1-3 bytes, zero padded to 3.
///
/// Also used for partial sysex chunks (`F0 d d`, `d d d`, `d F7`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "([u8; 3], u8)", into = "([u8; 3], u8)")]
pub struct MidiMessage {
    bytes: [u8; 3],
    /// Valid bytes in `bytes` (1-3).
    len: u8,
}

impl MidiMessage {
    /// `len` is clamped to 1-3.
    #[inline]
    pub fn new(bytes: [u8; 3], len: u8) -> Self {
        Self {
            bytes,
            len: len.clamp(1, 3),
        }
    }

    /// Copies up to three bytes; `None` for an empty slice.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.is_empty() {
            return None;
        }
        let len = slice.len().min(3);
        let mut bytes = [0u8; 3];
        bytes[..len].copy_from_slice(&slice[..len]);
        Some(Self {
            bytes,
            len: len as u8,
        })
    }

    /// All three bytes, including padding.
    #[inline]
    pub fn padded(&self) -> [u8; 3] {
        self.bytes
    }

    #[inline]
    pub fn num_bytes(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    #[inline]
    pub fn status(&self) -> u8 {
        self.bytes[0] & 0xF0
    }

    #[inline]
    pub fn channel(&self) -> u8 {
        self.bytes[0] & 0x0F
    }

    #[inline]
    pub fn class(&self) -> ByteClass {
        ByteClass::of(self.bytes[0])
    }

    /// Parse into a typed message. Sysex chunks and real-time bytes that
    /// midi-msg does not model come back as errors.
    pub fn to_midi_msg(&self) -> Result<MidiMsg, midi_msg::ParseError> {
        let (msg, _len) = MidiMsg::from_midi(self.as_slice())?;
        Ok(msg)
    }
}

impl From<([u8; 3], u8)> for MidiMessage {
    fn from((bytes, len): ([u8; 3], u8)) -> Self {
        Self::new(bytes, len)
    }
}

impl From<MidiMessage> for ([u8; 3], u8) {
    fn from(message: MidiMessage) -> Self {
        (message.bytes, message.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_class() {
        assert_eq!(ByteClass::of(0x00), ByteClass::Data);
        assert_eq!(ByteClass::of(0x7F), ByteClass::Data);
        assert_eq!(ByteClass::of(0x80), ByteClass::ChannelVoice(0x8));
        assert_eq!(ByteClass::of(0xEF), ByteClass::ChannelVoice(0xE));
        assert_eq!(ByteClass::of(0xF0), ByteClass::SysexStart);
        assert_eq!(ByteClass::of(0xF7), ByteClass::SysexEnd);
        assert_eq!(ByteClass::of(0xF8), ByteClass::System(0xF8));
        assert_eq!(ByteClass::of(0xF4), ByteClass::System(0xF4));
    }

    #[test]
    fn test_from_slice_pads() {
        let msg = MidiMessage::from_slice(&[0xC3, 0x05]).unwrap();
        assert_eq!(msg.padded(), [0xC3, 0x05, 0x00]);
        assert_eq!(msg.num_bytes(), 2);
        assert_eq!(msg.as_slice(), &[0xC3, 0x05]);
        assert_eq!(msg.status(), 0xC0);
        assert_eq!(msg.channel(), 3);
    }

    #[test]
    fn test_from_slice_truncates_and_rejects_empty() {
        let msg = MidiMessage::from_slice(&[0x11, 0x22, 0x33, 0x44]).unwrap();
        assert_eq!(msg.as_slice(), &[0x11, 0x22, 0x33]);
        assert!(MidiMessage::from_slice(&[]).is_none());
    }

    #[test]
    fn test_new_clamps_len() {
        assert_eq!(MidiMessage::new([0x90, 60, 100], 7).as_slice(), &[0x90, 60, 100]);
        assert_eq!(MidiMessage::new([0xF8, 0, 0], 0).as_slice(), &[0xF8]);
    }

    #[test]
    fn test_deserialize_clamps_len() {
        let msg: MidiMessage = bincode::deserialize(&[0x90, 0x40, 0x7F, 9]).unwrap();
        assert_eq!(msg.as_slice(), &[0x90, 0x40, 0x7F]);
    }

    #[test]
    fn test_to_midi_msg_note_on() {
        let msg = MidiMessage::from_slice(&[0x91, 60, 100]).unwrap();
        match msg.to_midi_msg().unwrap() {
            MidiMsg::ChannelVoice { channel, msg } => {
                assert_eq!(channel as u8, 1);
                assert_eq!(
                    msg,
                    midi_msg::ChannelVoiceMsg::NoteOn {
                        note: 60,
                        velocity: 100
                    }
                );
            }
            other => panic!("Expected ChannelVoice, got {:?}", other),
        }
    }
}
