//! Code Index Numbers (USB-MIDI 1.0, table 4-1).

use serde::{Deserialize, Serialize};

/// 4-bit tag in the low nibble of a packet's first byte classifying the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CodeIndex {
    /// Miscellaneous function codes. Reserved.
    Misc = 0x0,
    /// Cable events. Reserved.
    CableEvent = 0x1,
    /// Two-byte System Common message (MTC quarter frame, Song Select).
    SystemCommon2 = 0x2,
    /// Three-byte System Common message (Song Position Pointer).
    SystemCommon3 = 0x3,
    SysexStartOrContinue = 0x4,
    /// Single-byte System Common message, or sysex ending with one byte.
    ///
    /// The two meanings share a CIN; dispatch tells them apart by checking
    /// whether the payload byte is `0xF7`.
    SystemCommon1OrSysexEnd1 = 0x5,
    SysexEnd2 = 0x6,
    SysexEnd3 = 0x7,
    NoteOff = 0x8,
    NoteOn = 0x9,
    PolyKeyPress = 0xA,
    ControlChange = 0xB,
    ProgramChange = 0xC,
    ChannelPressure = 0xD,
    PitchBend = 0xE,
    /// Single byte, sent as-is (real-time messages).
    SingleByte = 0xF,
}

impl CodeIndex {
    /// Map the low nibble of `value` to its CIN. Total over all inputs.
    #[inline]
    pub const fn from_nibble(value: u8) -> Self {
        match value & 0x0F {
            0x0 => Self::Misc,
            0x1 => Self::CableEvent,
            0x2 => Self::SystemCommon2,
            0x3 => Self::SystemCommon3,
            0x4 => Self::SysexStartOrContinue,
            0x5 => Self::SystemCommon1OrSysexEnd1,
            0x6 => Self::SysexEnd2,
            0x7 => Self::SysexEnd3,
            0x8 => Self::NoteOff,
            0x9 => Self::NoteOn,
            0xA => Self::PolyKeyPress,
            0xB => Self::ControlChange,
            0xC => Self::ProgramChange,
            0xD => Self::ChannelPressure,
            0xE => Self::PitchBend,
            _ => Self::SingleByte,
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Number of MIDI bytes carried by a packet with this CIN (0 for reserved CINs).
    #[inline]
    pub const fn midi_len(self) -> usize {
        match self {
            Self::Misc | Self::CableEvent => 0,
            Self::SystemCommon1OrSysexEnd1 | Self::SingleByte => 1,
            Self::SystemCommon2 | Self::SysexEnd2 | Self::ProgramChange | Self::ChannelPressure => 2,
            _ => 3,
        }
    }

    /// CINs 0x0 and 0x1 are reserved for future expansion.
    #[inline]
    pub const fn is_reserved(self) -> bool {
        matches!(self, Self::Misc | Self::CableEvent)
    }

    /// True for the CINs that may carry sysex bytes (0x4-0x7).
    #[inline]
    pub const fn may_carry_sysex(self) -> bool {
        matches!(
            self,
            Self::SysexStartOrContinue
                | Self::SystemCommon1OrSysexEnd1
                | Self::SysexEnd2
                | Self::SysexEnd3
        )
    }
}

impl From<CodeIndex> for u8 {
    fn from(cin: CodeIndex) -> Self {
        cin.as_u8()
    }
}
