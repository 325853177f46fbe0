//! 4-byte USB-MIDI event packets.
//!
//! Byte 0 holds `(cable << 4) | cin`, bytes 1-3 the MIDI payload, zero padded.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::cin::CodeIndex;
use crate::error::{CodecError, Result};
use crate::message::{ByteClass, MidiMessage};

pub const PACKET_SIZE: usize = 4;

/// Cable numbers occupy the high nibble of the header byte.
pub const MAX_CABLES: u8 = 16;

/// A validated USB-MIDI event packet.
///
/// `num_midi_bytes` is always `cin.midi_len()`; the only ways to obtain a
/// packet are [`encode`] and [`decode`], both of which enforce that.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u8; 4]", into = "[u8; 4]")]
pub struct UsbMidiPacket {
    cable_num: u8,
    cin: CodeIndex,
    bytes: [u8; PACKET_SIZE],
    num_midi_bytes: u8,
}

impl UsbMidiPacket {
    #[inline]
    pub fn cable_num(&self) -> u8 {
        self.cable_num
    }

    #[inline]
    pub fn cin(&self) -> CodeIndex {
        self.cin
    }

    /// Number of meaningful payload bytes (1-3).
    #[inline]
    pub fn num_midi_bytes(&self) -> usize {
        self.num_midi_bytes as usize
    }

    /// The full wire representation.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; PACKET_SIZE] {
        &self.bytes
    }

    /// The payload without zero padding.
    #[inline]
    pub fn midi_bytes(&self) -> &[u8] {
        &self.bytes[1..1 + self.num_midi_bytes as usize]
    }

    #[inline]
    pub fn message(&self) -> MidiMessage {
        MidiMessage::new(
            [self.bytes[1], self.bytes[2], self.bytes[3]],
            self.num_midi_bytes,
        )
    }
}

/// The form every packet is logged in.
impl fmt::Display for UsbMidiPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "USB MIDI packet {:02x} {:02x} {:02x} {:02x} | cable {:02x} | CIN {:01x} | {} MIDI bytes",
            self.bytes[0],
            self.bytes[1],
            self.bytes[2],
            self.bytes[3],
            self.cable_num,
            self.cin.as_u8(),
            self.num_midi_bytes
        )
    }
}

impl fmt::Debug for UsbMidiPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsbMidiPacket")
            .field("cable_num", &self.cable_num)
            .field("cin", &self.cin)
            .field("bytes", &format_args!("{:02x?}", self.bytes))
            .field("num_midi_bytes", &self.num_midi_bytes)
            .finish()
    }
}

impl TryFrom<[u8; PACKET_SIZE]> for UsbMidiPacket {
    type Error = CodecError;

    fn try_from(bytes: [u8; PACKET_SIZE]) -> Result<Self> {
        decode(bytes)
    }
}

impl From<UsbMidiPacket> for [u8; PACKET_SIZE] {
    fn from(packet: UsbMidiPacket) -> Self {
        packet.bytes
    }
}

/// Classify a 1-3 byte message: channel voice, then non-sysex system, then
/// one of the seven legal sysex chunk shapes.
fn code_index_for(midi_bytes: &[u8; 3]) -> Option<CodeIndex> {
    use ByteClass::*;

    let classes = (
        ByteClass::of(midi_bytes[0]),
        ByteClass::of(midi_bytes[1]),
        ByteClass::of(midi_bytes[2]),
    );

    let cin = match classes {
        // Channel voice: the CIN is the status nibble
        (ChannelVoice(nibble), _, _) => CodeIndex::from_nibble(nibble),

        // System common / real-time, matched on the exact status byte
        (System(0xF1 | 0xF3), _, _) => CodeIndex::SystemCommon2,
        (System(0xF2), _, _) => CodeIndex::SystemCommon3,
        (System(0xF6), _, _) => CodeIndex::SystemCommon1OrSysexEnd1,
        (System(0xF8 | 0xFA | 0xFB | 0xFC | 0xFE | 0xFF), _, _) => CodeIndex::SingleByte,
        // 0xF4, 0xF5, 0xF9, 0xFD are undefined
        (System(_), _, _) => return None,

        // Sysex chunks
        (SysexStart, SysexEnd, _) => CodeIndex::SysexEnd2,
        (SysexStart, Data, SysexEnd) => CodeIndex::SysexEnd3,
        (SysexStart, Data, Data) => CodeIndex::SysexStartOrContinue,
        (Data, Data, Data) => CodeIndex::SysexStartOrContinue,
        (Data, Data, SysexEnd) => CodeIndex::SysexEnd3,
        (Data, SysexEnd, _) => CodeIndex::SysexEnd2,
        (SysexEnd, _, _) => CodeIndex::SystemCommon1OrSysexEnd1,

        _ => return None,
    };

    Some(cin)
}

/// Build a packet from a 1-3 byte MIDI message (unused trailing bytes are
/// ignored and may be anything) and a cable number.
pub fn encode(midi_bytes: [u8; 3], cable_num: u8) -> Result<UsbMidiPacket> {
    if cable_num >= MAX_CABLES {
        return Err(CodecError::InvalidCableNumber(cable_num));
    }

    let cin = code_index_for(&midi_bytes).ok_or(CodecError::InvalidMidiMessage(midi_bytes))?;
    let num_midi_bytes = cin.midi_len();
    if num_midi_bytes == 0 {
        return Err(CodecError::InvalidMidiMessage(midi_bytes));
    }

    let mut bytes = [0u8; PACKET_SIZE];
    bytes[0] = (cable_num << 4) | cin.as_u8();
    bytes[1..1 + num_midi_bytes].copy_from_slice(&midi_bytes[..num_midi_bytes]);

    Ok(UsbMidiPacket {
        cable_num,
        cin,
        bytes,
        num_midi_bytes: num_midi_bytes as u8,
    })
}

/// Parse a packet received from the wire. Only the header byte is
/// validated; payload bytes are taken as-is.
pub fn decode(packet_bytes: [u8; PACKET_SIZE]) -> Result<UsbMidiPacket> {
    let cable_num = packet_bytes[0] >> 4;
    let cin = CodeIndex::from_nibble(packet_bytes[0]);
    let num_midi_bytes = cin.midi_len();
    if num_midi_bytes == 0 {
        return Err(CodecError::InvalidCin(cin.as_u8()));
    }

    Ok(UsbMidiPacket {
        cable_num,
        cin,
        bytes: packet_bytes,
        num_midi_bytes: num_midi_bytes as u8,
    })
}

impl MidiMessage {
    /// Like [`encode`], but the message length must match the length its
    /// status byte calls for. A truncated note on is an error here, not a
    /// note on with velocity 0.
    pub fn encode(&self, cable_num: u8) -> Result<UsbMidiPacket> {
        let packet = encode(self.padded(), cable_num)?;
        if packet.num_midi_bytes() != self.num_bytes() {
            return Err(CodecError::InvalidMidiMessage(self.padded()));
        }
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_messages() {
        let cable_num = 7;
        for high_nibble in 0x8u8..0xF {
            let packet = encode([high_nibble << 4, 0x12, 0x23], cable_num).unwrap();
            assert_eq!(packet.cin().as_u8(), high_nibble);
            assert_eq!(packet.cable_num(), cable_num);
            if high_nibble == 0xC || high_nibble == 0xD {
                assert_eq!(packet.num_midi_bytes(), 2);
            } else {
                assert_eq!(packet.num_midi_bytes(), 3);
            }
        }
    }

    #[test]
    fn test_system_and_sysex_messages() {
        let messages: [([u8; 3], CodeIndex); 17] = [
            // System real time
            ([0xF8, 0, 0], CodeIndex::SingleByte),
            ([0xFA, 0, 0], CodeIndex::SingleByte),
            ([0xFB, 0, 0], CodeIndex::SingleByte),
            ([0xFC, 0, 0], CodeIndex::SingleByte),
            ([0xFE, 0, 0], CodeIndex::SingleByte),
            ([0xFF, 0, 0], CodeIndex::SingleByte),
            // System common
            ([0xF1, 0x01, 0], CodeIndex::SystemCommon2),
            ([0xF2, 0x02, 0x03], CodeIndex::SystemCommon3),
            ([0xF3, 0x04, 0], CodeIndex::SystemCommon2),
            ([0xF6, 0, 0], CodeIndex::SystemCommon1OrSysexEnd1),
            // Sysex
            ([0xF0, 0xF7, 0], CodeIndex::SysexEnd2),
            ([0xF0, 0x11, 0xF7], CodeIndex::SysexEnd3),
            ([0xF0, 0x11, 0x11], CodeIndex::SysexStartOrContinue),
            ([0x11, 0x11, 0x11], CodeIndex::SysexStartOrContinue),
            ([0x11, 0x11, 0xF7], CodeIndex::SysexEnd3),
            ([0x11, 0xF7, 0], CodeIndex::SysexEnd2),
            ([0xF7, 0, 0], CodeIndex::SystemCommon1OrSysexEnd1),
        ];

        for (bytes, expected) in messages {
            let packet = encode(bytes, 7).unwrap();
            assert_eq!(packet.cin(), expected, "message {:02x?}", bytes);
            assert_eq!(packet.cable_num(), 7);
        }
    }

    #[test]
    fn test_undefined_status_bytes_rejected() {
        for status in [0xF4, 0xF5, 0xF9, 0xFD] {
            assert_eq!(
                encode([status, 0, 0], 0),
                Err(CodecError::InvalidMidiMessage([status, 0, 0]))
            );
        }
    }

    #[test]
    fn test_illegal_sysex_shapes_rejected() {
        // Data byte followed by a status that is not F7
        assert!(encode([0x11, 0x90, 0x00], 0).is_err());
        // F0 followed by another F0
        assert!(encode([0xF0, 0xF0, 0x00], 0).is_err());
        // F0 d followed by a non-F7 status
        assert!(encode([0xF0, 0x11, 0x80], 0).is_err());
        // d d followed by F0
        assert!(encode([0x11, 0x22, 0xF0], 0).is_err());
    }

    #[test]
    fn test_invalid_cable_number() {
        assert_eq!(
            encode([0x90, 0x40, 0x40], 16),
            Err(CodecError::InvalidCableNumber(16))
        );
        assert!(encode([0x90, 0x40, 0x40], 15).is_ok());
    }

    #[test]
    fn test_encode_layout_zero_pads() {
        let packet = encode([0xC5, 0x09, 0x55], 3).unwrap();
        assert_eq!(packet.as_bytes(), &[0x3C, 0xC5, 0x09, 0x00]);
        assert_eq!(packet.midi_bytes(), &[0xC5, 0x09]);

        let packet = encode([0xF8, 0x12, 0x34], 15).unwrap();
        assert_eq!(packet.as_bytes(), &[0xFF, 0xF8, 0x00, 0x00]);
    }

    #[test]
    fn test_decode_reserved_cin() {
        assert_eq!(decode([0x00, 0, 0, 0]), Err(CodecError::InvalidCin(0x0)));
        assert_eq!(decode([0x31, 0, 0, 0]), Err(CodecError::InvalidCin(0x1)));
    }

    #[test]
    fn test_decode_fields() {
        let packet = decode([0x2B, 0xB0, 0x07, 0x64]).unwrap();
        assert_eq!(packet.cable_num(), 2);
        assert_eq!(packet.cin(), CodeIndex::ControlChange);
        assert_eq!(packet.midi_bytes(), &[0xB0, 0x07, 0x64]);
        assert_eq!(packet.message().as_slice(), &[0xB0, 0x07, 0x64]);
    }

    #[test]
    fn test_message_encode_checks_length() {
        let truncated_note_on = MidiMessage::from_slice(&[0x90, 0x40]).unwrap();
        assert_eq!(
            truncated_note_on.encode(0),
            Err(CodecError::InvalidMidiMessage([0x90, 0x40, 0x00]))
        );

        let lone_data_byte = MidiMessage::from_slice(&[0x11]).unwrap();
        assert_eq!(
            lone_data_byte.encode(0),
            Err(CodecError::InvalidMidiMessage([0x11, 0x00, 0x00]))
        );

        let program_change = MidiMessage::from_slice(&[0xC5, 0x09]).unwrap();
        assert_eq!(program_change.encode(3).unwrap().as_bytes(), &[0x3C, 0xC5, 0x09, 0x00]);

        let sysex_end = MidiMessage::from_slice(&[0x11, 0xF7]).unwrap();
        assert_eq!(sysex_end.encode(0).unwrap().cin(), CodeIndex::SysexEnd2);
    }

    #[test]
    fn test_message_roundtrips_through_packet() {
        let packet = encode([0xB0, 0x07, 0x64], 2).unwrap();
        assert_eq!(packet.message().encode(2), Ok(packet));
    }

    #[test]
    fn test_try_from_matches_decode() {
        let bytes = [0x15, 0xF7, 0x00, 0x00];
        assert_eq!(UsbMidiPacket::try_from(bytes), decode(bytes));
        let raw: [u8; 4] = decode(bytes).unwrap().into();
        assert_eq!(raw, bytes);
    }
}
