//! USB-MIDI streaming on top of the packet codec.
//!
//! Provides the sysex chunking transmitter (one packet per transport-ready
//! signal), per-cable transmitter state, sysex reception bookkeeping, the
//! transport boundary, and [`UsbMidiDevice`], which ties transport events to
//! all of the above.
//!
//! # Example
//!
//! ```
//! use usb_midi_stream::{memory_transport, SysexGenerator, TxProgress, UsbMidiDevice, UsbStatus};
//!
//! let (transport, host) = memory_transport(1024);
//! let device = UsbMidiDevice::builder().output_cables(2).build(transport)?;
//! device.handle_status(UsbStatus::Configured);
//!
//! device.send(0, [0x90, 60, 100])?;
//! device.start_sysex(1, 8, SysexGenerator::test_pattern())?;
//! while device.on_packet_sent()?.is_some() {}
//!
//! assert_eq!(host.pending(), 1 + 3);
//! # Ok::<(), usb_midi_stream::Error>(())
//! ```

pub mod error;
pub use error::{Error, Result, TransportError};

mod stats;
pub use stats::TransferStats;

mod status;
pub use status::{Availability, UsbStatus};

pub mod transport;
pub use transport::{
    memory_transport, HostEnd, MemoryTransport, Transport, TransportEvent, MIDI_IN_ENDPOINT,
    MIDI_OUT_ENDPOINT,
};

mod tx_buffer;
pub use tx_buffer::TxBuffer;

pub mod sysex;
pub use sysex::{
    CableTransmitters, SysexBuffer, SysexGenerator, SysexReceiver, SysexReception, SysexSource,
    SysexSummary, SysexTransmitter, TxProgress,
};

mod device;
pub use device::{DeviceBuilder, DeviceConfig, UsbMidiDevice, DEFAULT_MAX_PACKET_SIZE};

// Re-export the codec so downstream users only need this crate
pub use usb_midi_packet::{
    decode, dispatch, encode, events, CodeIndex, CodecError, Handlers, MidiMessage, PacketEvent,
    PacketHandler, UsbMidiPacket,
};
