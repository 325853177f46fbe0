//! USB device status and the derived availability flag.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// Device-level status notifications from the USB stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsbStatus {
    Error,
    Reset,
    Connected,
    Configured,
    Disconnected,
    Suspend,
    Resume,
    Interface,
    SetHalt,
    ClearHalt,
    Sof,
    Unknown,
}

impl UsbStatus {
    /// The availability this status implies, if it changes it at all.
    ///
    /// Only `Configured` makes the device usable and only `Suspend` takes
    /// that away.
    #[inline]
    pub fn availability(self) -> Option<bool> {
        match self {
            Self::Configured => Some(true),
            Self::Suspend => Some(false),
            _ => None,
        }
    }
}

/// Whether the host has configured the device.
///
/// Written from the USB status path and read from anywhere.
#[derive(Debug, Default)]
pub struct Availability {
    available: AtomicBool,
}

impl Availability {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Apply a status notification. Returns the new availability only when
    /// it actually changed.
    pub fn update(&self, status: UsbStatus) -> Option<bool> {
        tracing::debug!("USB status {:?}", status);

        let available = status.availability()?;
        let was = self.available.swap(available, Ordering::AcqRel);
        if was == available {
            return None;
        }

        tracing::info!("USB MIDI device {}", if available { "available" } else { "unavailable" });
        Some(available)
    }
}
