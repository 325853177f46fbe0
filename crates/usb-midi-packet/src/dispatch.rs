//! Routing decoded packets to message / sysex handlers.
//!
//! A packet expands into at most three [`PacketEvent`]s, always in the order
//! start, data, end. Callers can either match on [`events`] or implement
//! [`PacketHandler`] and call [`dispatch`].
//!
//! No state is kept here; sysex reassembly belongs to whoever consumes the
//! events.

use alloc::boxed::Box;

use smallvec::SmallVec;

use crate::cin::CodeIndex;
use crate::error::{CodecError, Result};
use crate::message::{MidiMessage, SYSEX_END, SYSEX_START};
use crate::packet::{decode, UsbMidiPacket, PACKET_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketEvent {
    /// A complete non-sysex message (channel voice, system common, real-time).
    Message { cable: u8, message: MidiMessage },
    SysexStart { cable: u8 },
    /// Sysex payload bytes, excluding the `F0`/`F7` framing.
    SysexData { cable: u8, data: MidiMessage },
    SysexEnd { cable: u8 },
}

impl PacketEvent {
    pub fn cable(&self) -> u8 {
        match *self {
            Self::Message { cable, .. }
            | Self::SysexStart { cable }
            | Self::SysexData { cable, .. }
            | Self::SysexEnd { cable } => cable,
        }
    }
}

pub type PacketEvents = SmallVec<[PacketEvent; 3]>;

fn data(slice: &[u8], cable: u8) -> Option<PacketEvent> {
    MidiMessage::from_slice(slice).map(|data| PacketEvent::SysexData { cable, data })
}

/// Expand a packet into the events it carries. Reserved CINs yield nothing.
pub fn events(packet: &UsbMidiPacket) -> PacketEvents {
    let cable = packet.cable_num();
    let bytes = packet.as_bytes();
    let mut out = PacketEvents::new();

    match packet.cin() {
        CodeIndex::Misc | CodeIndex::CableEvent => {
            tracing::trace!("Dropping packet with reserved CIN: {}", packet);
        }
        CodeIndex::SysexStartOrContinue => {
            if bytes[1] == SYSEX_START {
                out.push(PacketEvent::SysexStart { cable });
                out.extend(data(&bytes[2..4], cable));
            } else {
                out.extend(data(&bytes[1..4], cable));
            }
        }
        CodeIndex::SystemCommon1OrSysexEnd1 => {
            if bytes[1] == SYSEX_END {
                out.push(PacketEvent::SysexEnd { cable });
            } else {
                out.push(PacketEvent::Message {
                    cable,
                    message: packet.message(),
                });
            }
        }
        CodeIndex::SysexEnd2 => {
            if bytes[1] == SYSEX_START {
                // Empty sysex: F0 F7
                out.push(PacketEvent::SysexStart { cable });
            } else {
                out.extend(data(&bytes[1..2], cable));
            }
            out.push(PacketEvent::SysexEnd { cable });
        }
        CodeIndex::SysexEnd3 => {
            if bytes[1] == SYSEX_START {
                out.push(PacketEvent::SysexStart { cable });
                out.extend(data(&bytes[2..3], cable));
            } else {
                out.extend(data(&bytes[1..3], cable));
            }
            out.push(PacketEvent::SysexEnd { cable });
        }
        _ => {
            out.push(PacketEvent::Message {
                cable,
                message: packet.message(),
            });
        }
    }

    out
}

/// Receiver side of [`dispatch`]. Every method defaults to a no-op so
/// implementors only override what they care about.
pub trait PacketHandler {
    fn on_message(&mut self, _bytes: &[u8], _cable: u8) {}

    fn on_sysex_start(&mut self, _cable: u8) {}

    fn on_sysex_data(&mut self, _data: &[u8], _cable: u8) {}

    fn on_sysex_end(&mut self, _cable: u8) {}

    /// Feed one event to the matching callback.
    fn handle_event(&mut self, event: &PacketEvent) {
        match event {
            PacketEvent::Message { cable, message } => self.on_message(message.as_slice(), *cable),
            PacketEvent::SysexStart { cable } => self.on_sysex_start(*cable),
            PacketEvent::SysexData { cable, data } => self.on_sysex_data(data.as_slice(), *cable),
            PacketEvent::SysexEnd { cable } => self.on_sysex_end(*cable),
        }
    }
}

impl<H: PacketHandler + ?Sized> PacketHandler for &mut H {
    fn on_message(&mut self, bytes: &[u8], cable: u8) {
        (**self).on_message(bytes, cable)
    }

    fn on_sysex_start(&mut self, cable: u8) {
        (**self).on_sysex_start(cable)
    }

    fn on_sysex_data(&mut self, data: &[u8], cable: u8) {
        (**self).on_sysex_data(data, cable)
    }

    fn on_sysex_end(&mut self, cable: u8) {
        (**self).on_sysex_end(cable)
    }
}

impl<H: PacketHandler + ?Sized> PacketHandler for Box<H> {
    fn on_message(&mut self, bytes: &[u8], cable: u8) {
        (**self).on_message(bytes, cable)
    }

    fn on_sysex_start(&mut self, cable: u8) {
        (**self).on_sysex_start(cable)
    }

    fn on_sysex_data(&mut self, data: &[u8], cable: u8) {
        (**self).on_sysex_data(data, cable)
    }

    fn on_sysex_end(&mut self, cable: u8) {
        (**self).on_sysex_end(cable)
    }
}

/// Route one packet to `handler`. Never fails; reserved CINs are dropped.
pub fn dispatch<H: PacketHandler + ?Sized>(packet: &UsbMidiPacket, handler: &mut H) {
    for event in events(packet) {
        handler.handle_event(&event);
    }
}

/// Decode and dispatch raw wire bytes.
///
/// Packets with a reserved CIN are dropped silently and reported as
/// `Ok(false)`; `Ok(true)` means the packet reached `handler`.
pub fn dispatch_raw<H: PacketHandler + ?Sized>(
    packet_bytes: [u8; PACKET_SIZE],
    handler: &mut H,
) -> Result<bool> {
    match decode(packet_bytes) {
        Ok(packet) => {
            dispatch(&packet, handler);
            Ok(true)
        }
        Err(CodecError::InvalidCin(cin)) if CodeIndex::from_nibble(cin).is_reserved() => {
            tracing::trace!("Dropping packet with reserved CIN {:#x}", cin);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

type MessageFn = Box<dyn FnMut(&[u8], u8) + Send>;
type CableFn = Box<dyn FnMut(u8) + Send>;

/// Closure-based handler set. Unset callbacks are skipped.
///
/// ```
/// use usb_midi_packet::{dispatch, encode, Handlers};
///
/// let mut handlers = Handlers::new().message(|bytes, cable| {
///     assert_eq!(bytes, &[0x90, 60, 100]);
///     assert_eq!(cable, 1);
/// });
/// dispatch(&encode([0x90, 60, 100], 1)?, &mut handlers);
/// # Ok::<(), usb_midi_packet::CodecError>(())
/// ```
#[derive(Default)]
pub struct Handlers {
    message: Option<MessageFn>,
    sysex_start: Option<CableFn>,
    sysex_data: Option<MessageFn>,
    sysex_end: Option<CableFn>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, f: impl FnMut(&[u8], u8) + Send + 'static) -> Self {
        self.message = Some(Box::new(f));
        self
    }

    pub fn sysex_start(mut self, f: impl FnMut(u8) + Send + 'static) -> Self {
        self.sysex_start = Some(Box::new(f));
        self
    }

    pub fn sysex_data(mut self, f: impl FnMut(&[u8], u8) + Send + 'static) -> Self {
        self.sysex_data = Some(Box::new(f));
        self
    }

    pub fn sysex_end(mut self, f: impl FnMut(u8) + Send + 'static) -> Self {
        self.sysex_end = Some(Box::new(f));
        self
    }
}

impl PacketHandler for Handlers {
    fn on_message(&mut self, bytes: &[u8], cable: u8) {
        if let Some(f) = self.message.as_mut() {
            f(bytes, cable);
        }
    }

    fn on_sysex_start(&mut self, cable: u8) {
        if let Some(f) = self.sysex_start.as_mut() {
            f(cable);
        }
    }

    fn on_sysex_data(&mut self, data: &[u8], cable: u8) {
        if let Some(f) = self.sysex_data.as_mut() {
            f(data, cable);
        }
    }

    fn on_sysex_end(&mut self, cable: u8) {
        if let Some(f) = self.sysex_end.as_mut() {
            f(cable);
        }
    }
}
