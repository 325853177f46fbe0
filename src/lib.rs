//! # usb-midi - USB-MIDI Device Function
//!
//! Packet codec, dispatcher and sysex streaming for the device side of a
//! USB-MIDI 1.0 link.
//!
//! ## Architecture
//!
//! usb-midi is an umbrella crate that coordinates:
//! - **usb-midi-packet** - 4-byte event packet codec and dispatcher (`no_std`)
//! - **usb-midi-stream** - Sysex chunking transmitter, sysex reception,
//!   transport boundary and the event-driven device
//!
//! ## Quick Start
//!
//! ```
//! use usb_midi::prelude::*;
//!
//! let (transport, mut host) = memory_transport(256);
//! let device = UsbMidiDevice::builder()
//!     .handler(Handlers::new().message(|bytes, cable| {
//!         println!("cable {}: {:02x?}", cable, bytes);
//!     }))
//!     .build(transport)?;
//! device.handle_status(UsbStatus::Configured);
//!
//! // Outgoing
//! device.send(0, [0x90, 0x45, 0x7f])?;
//! assert_eq!(host.recv(), Some([0x09, 0x90, 0x45, 0x7f]));
//!
//! // Incoming
//! host.send([0x08, 0x80, 0x45, 0x00]);
//! assert_eq!(device.poll_rx()?, 1);
//! # Ok::<(), usb_midi::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Codec and streaming layer
//! - `stream` - Sysex transmitter, transport and device (requires std)

/// Re-export of usb-midi-packet for direct access
pub use usb_midi_packet as packet;

#[cfg(feature = "stream")]
pub use usb_midi_stream as stream;

// Codec types
pub use usb_midi_packet::{
    decode, dispatch, dispatch_raw, encode, events, ByteClass, CodeIndex, CodecError, Handlers,
    MidiMessage, MidiMsg, PacketEvent, PacketEvents, PacketHandler, UsbMidiPacket, MAX_CABLES,
    PACKET_SIZE, SYSEX_END, SYSEX_START,
};

// Streaming layer
#[cfg(feature = "stream")]
pub use usb_midi_stream::{
    memory_transport, Availability, CableTransmitters, DeviceBuilder, DeviceConfig, HostEnd,
    MemoryTransport, SysexBuffer, SysexGenerator, SysexReceiver, SysexReception, SysexSource,
    SysexSummary, SysexTransmitter, TransferStats, Transport, TransportError, TransportEvent,
    TxBuffer, TxProgress, UsbMidiDevice, UsbStatus, MIDI_IN_ENDPOINT, MIDI_OUT_ENDPOINT,
};

mod error;
pub use error::{Error, Result};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{
        decode, dispatch, encode, events, CodeIndex, Error, Handlers, MidiMessage, PacketEvent,
        PacketHandler, Result, UsbMidiPacket,
    };

    #[cfg(feature = "stream")]
    pub use crate::{
        memory_transport, DeviceConfig, SysexBuffer, SysexGenerator, SysexSource, SysexSummary,
        Transport, TransportEvent, TxProgress, UsbMidiDevice, UsbStatus,
    };
}
