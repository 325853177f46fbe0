//! Device configuration and builder.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use usb_midi_packet::{PacketHandler, MAX_CABLES, PACKET_SIZE};

use super::{AvailabilityCallback, SysexCallback, UsbMidiDevice};
use crate::error::{Error, Result};
use crate::sysex::SysexSummary;
use crate::transport::Transport;

/// Full-speed bulk endpoint size.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 64;

/// High-speed bulk endpoints top out at 512 bytes.
const MAX_PACKET_SIZE_LIMIT: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Cables accepted from the host.
    pub input_cables: u8,
    /// Cables the device sends on.
    pub output_cables: u8,
    /// Bulk endpoint size in bytes.
    pub max_packet_size: usize,
    /// Send sysex as full bulk transfers instead of one packet per ready signal.
    pub batch_transfers: bool,
    /// Bytes kept from each received sysex message. 0 counts only.
    pub capture_limit: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            input_cables: 1,
            output_cables: 1,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            batch_transfers: false,
            capture_limit: 0,
        }
    }
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, count) in [
            ("input_cables", self.input_cables),
            ("output_cables", self.output_cables),
        ] {
            if count == 0 || count > MAX_CABLES {
                return Err(Error::InvalidConfig(format!(
                    "{} must be in 1..={}, got {}",
                    name, MAX_CABLES, count
                )));
            }
        }

        let size = self.max_packet_size;
        if !(PACKET_SIZE..=MAX_PACKET_SIZE_LIMIT).contains(&size) || size % PACKET_SIZE != 0 {
            return Err(Error::InvalidConfig(format!(
                "max_packet_size must be a multiple of {} in {}..={}, got {}",
                PACKET_SIZE, PACKET_SIZE, MAX_PACKET_SIZE_LIMIT, size
            )));
        }

        Ok(())
    }
}

pub struct DeviceBuilder<T> {
    pub(super) config: DeviceConfig,
    pub(super) handler: Option<Box<dyn PacketHandler + Send>>,
    pub(super) on_available: Option<AvailabilityCallback>,
    pub(super) on_sysex_received: Option<SysexCallback>,
    _transport: PhantomData<fn() -> T>,
}

impl<T> Default for DeviceBuilder<T> {
    fn default() -> Self {
        Self {
            config: DeviceConfig::default(),
            handler: None,
            on_available: None,
            on_sysex_received: None,
            _transport: PhantomData,
        }
    }
}

impl<T: Transport> DeviceBuilder<T> {
    /// Replace the whole configuration, e.g. one loaded from settings.
    pub fn config(mut self, config: DeviceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn input_cables(mut self, count: u8) -> Self {
        self.config.input_cables = count;
        self
    }

    pub fn output_cables(mut self, count: u8) -> Self {
        self.config.output_cables = count;
        self
    }

    pub fn max_packet_size(mut self, bytes: usize) -> Self {
        self.config.max_packet_size = bytes;
        self
    }

    pub fn batch_transfers(mut self, enabled: bool) -> Self {
        self.config.batch_transfers = enabled;
        self
    }

    pub fn capture_limit(mut self, bytes: usize) -> Self {
        self.config.capture_limit = bytes;
        self
    }

    /// Application callbacks for received packets.
    pub fn handler(mut self, handler: impl PacketHandler + Send + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Called once per availability change.
    pub fn on_available(mut self, f: impl FnMut(bool) + Send + 'static) -> Self {
        self.on_available = Some(Box::new(f));
        self
    }

    /// Called with each completely received sysex message.
    pub fn on_sysex_received(mut self, f: impl FnMut(SysexSummary) + Send + 'static) -> Self {
        self.on_sysex_received = Some(Box::new(f));
        self
    }

    pub fn build(self, transport: T) -> Result<UsbMidiDevice<T>> {
        self.config.validate()?;
        tracing::debug!("Building USB MIDI device: {:?}", self.config);
        UsbMidiDevice::from_builder(self, transport)
    }
}
