//! USB-MIDI event packet codec.
//!
//! Converts between raw MIDI messages (1-3 bytes, including partial sysex
//! chunks) and the fixed 4-byte USB-MIDI event packet defined by the USB
//! Device Class Definition for MIDI Devices, and routes decoded packets to
//! message / sysex handlers.
//!
//! Everything here is pure: no I/O, no shared state, no allocation on the
//! encode/decode path.
//!
//! # Example
//!
//! ```
//! use usb_midi_packet::{decode, encode, CodeIndex};
//!
//! let packet = encode([0x90, 0x45, 0x7f], 0)?;
//! assert_eq!(packet.as_bytes(), &[0x09, 0x90, 0x45, 0x7f]);
//!
//! let decoded = decode(*packet.as_bytes())?;
//! assert_eq!(decoded.cin(), CodeIndex::NoteOn);
//! assert_eq!(decoded.midi_bytes(), &[0x90, 0x45, 0x7f]);
//! # Ok::<(), usb_midi_packet::CodecError>(())
//! ```

#![no_std]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod error;
pub use error::{CodecError, Result};

mod cin;
pub use cin::CodeIndex;

mod message;
pub use message::{ByteClass, MidiMessage, SYSEX_END, SYSEX_START};

mod packet;
pub use packet::{decode, encode, UsbMidiPacket, MAX_CABLES, PACKET_SIZE};

pub mod dispatch;
pub use dispatch::{
    dispatch, dispatch_raw, events, Handlers, PacketEvent, PacketEvents, PacketHandler,
};

// Re-export the typed message so callers don't need midi-msg directly
pub use midi_msg::MidiMsg;
