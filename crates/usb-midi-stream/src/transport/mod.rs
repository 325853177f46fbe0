//! The boundary to the USB stack.
//!
//! The device never talks to hardware directly: it writes packets to the bulk
//! IN endpoint and reads them from the bulk OUT endpoint through a
//! [`Transport`], and learns about completed transfers and bus state through
//! [`TransportEvent`]s.

mod memory;
pub use memory::{memory_transport, HostEnd, MemoryTransport};

use crate::error::TransportError;
use crate::status::UsbStatus;

/// Bulk IN endpoint, device to host.
pub const MIDI_IN_ENDPOINT: u8 = 0x81;

/// Bulk OUT endpoint, host to device.
pub const MIDI_OUT_ENDPOINT: u8 = 0x01;

/// Raw endpoint access.
///
/// Both calls must return without blocking. `write` reports how many bytes
/// the endpoint accepted; `read` returns 0 when nothing is pending.
pub trait Transport {
    fn write(&mut self, endpoint: u8, bytes: &[u8]) -> Result<usize, TransportError>;

    fn read(&mut self, endpoint: u8, buf: &mut [u8]) -> Result<usize, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, endpoint: u8, bytes: &[u8]) -> Result<usize, TransportError> {
        (**self).write(endpoint, bytes)
    }

    fn read(&mut self, endpoint: u8, buf: &mut [u8]) -> Result<usize, TransportError> {
        (**self).read(endpoint, buf)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, endpoint: u8, bytes: &[u8]) -> Result<usize, TransportError> {
        (**self).write(endpoint, bytes)
    }

    fn read(&mut self, endpoint: u8, buf: &mut [u8]) -> Result<usize, TransportError> {
        (**self).read(endpoint, buf)
    }
}

/// Notifications from the USB stack, delivered to
/// [`UsbMidiDevice::process_events`](crate::UsbMidiDevice::process_events).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// The previous IN transfer completed; the endpoint can take another.
    PacketSent,
    Status(UsbStatus),
    /// Packets are waiting on the OUT endpoint.
    DataReceived,
}
