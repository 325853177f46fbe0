//! One transmitter per output cable.
//!
//! Index-based: cable `n` is slot `n`. Each slot has its own lock, so starts,
//! ready signals and aborts for one cable are serialized while different
//! cables proceed independently.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard};
use usb_midi_packet::MAX_CABLES;

use super::source::SysexSource;
use super::transmitter::SysexTransmitter;
use crate::error::{Error, Result};

pub struct CableTransmitters {
    cables: Vec<Mutex<SysexTransmitter>>,
    /// Where the next round-robin search starts.
    cursor: AtomicUsize,
}

impl CableTransmitters {
    pub fn new(count: u8) -> Result<Self> {
        if count == 0 || count > MAX_CABLES {
            return Err(Error::InvalidConfig(format!(
                "cable count {} outside 1..={}",
                count, MAX_CABLES
            )));
        }

        let cables = (0..count)
            .map(|cable| SysexTransmitter::new(cable).map(Mutex::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            cables,
            cursor: AtomicUsize::new(0),
        })
    }

    #[inline]
    pub fn count(&self) -> u8 {
        self.cables.len() as u8
    }

    pub fn lock(&self, cable: u8) -> Result<MutexGuard<'_, SysexTransmitter>> {
        self.cables
            .get(cable as usize)
            .map(|slot| slot.lock())
            .ok_or(Error::CableOutOfRange {
                cable,
                count: self.count(),
            })
    }

    pub fn start<S: SysexSource + 'static>(&self, cable: u8, total_len: usize, source: S) -> Result<()> {
        self.lock(cable)?.start(total_len, source)
    }

    /// Returns the bytes sent before the abort, `None` if the cable was idle.
    pub fn abort(&self, cable: u8) -> Result<Option<usize>> {
        Ok(self.lock(cable)?.abort())
    }

    /// Abort every cable. Returns how many were sending.
    pub fn abort_all(&self) -> usize {
        self.cables
            .iter()
            .filter_map(|slot| slot.lock().abort())
            .count()
    }

    pub fn is_sending(&self, cable: u8) -> bool {
        self.cables
            .get(cable as usize)
            .is_some_and(|slot| slot.lock().is_sending())
    }

    pub fn any_sending(&self) -> bool {
        self.cables.iter().any(|slot| slot.lock().is_sending())
    }

    /// Lock the next sending cable after the one served last, wrapping
    /// around. `None` if every cable is idle.
    pub fn next_sending(&self) -> Option<MutexGuard<'_, SysexTransmitter>> {
        let count = self.cables.len();
        let start = self.cursor.load(Ordering::Relaxed) % count;

        for offset in 0..count {
            let index = (start + offset) % count;
            let guard = self.cables[index].lock();
            if guard.is_sending() {
                self.cursor.store(index + 1, Ordering::Relaxed);
                return Some(guard);
            }
        }
        None
    }
}

impl std::fmt::Debug for CableTransmitters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CableTransmitters")
            .field("count", &self.cables.len())
            .finish_non_exhaustive()
    }
}
