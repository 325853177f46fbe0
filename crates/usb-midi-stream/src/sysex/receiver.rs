//! Sysex reception bookkeeping.
//!
//! Tracks one open reception per cable from `sysex_start` to `sysex_end`,
//! counting bytes and optionally keeping a copy of the first
//! `capture_limit` of them.

use std::time::{Duration, Instant};

use usb_midi_packet::{PacketHandler, MAX_CABLES, SYSEX_END, SYSEX_START};

use crate::stats::TransferStats;

/// A sysex message being received on one cable.
#[derive(Debug, Clone)]
pub struct SysexReception {
    pub cable: u8,
    /// Bytes so far, counting the `F0`.
    pub byte_count: usize,
    pub started: Instant,
    pub captured: Vec<u8>,
}

impl SysexReception {
    fn new(cable: u8) -> Self {
        Self {
            cable,
            byte_count: 0,
            started: Instant::now(),
            captured: Vec::new(),
        }
    }

    fn push(&mut self, bytes: &[u8], capture_limit: usize) {
        self.byte_count += bytes.len();
        let room = capture_limit.saturating_sub(self.captured.len());
        self.captured
            .extend_from_slice(&bytes[..bytes.len().min(room)]);
    }
}

/// A completed reception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysexSummary {
    pub cable: u8,
    /// Total bytes including the `F0`/`F7` framing.
    pub byte_count: usize,
    pub elapsed: Duration,
    /// The first `capture_limit` bytes of the message.
    pub data: Vec<u8>,
}

impl SysexSummary {
    pub fn stats(&self) -> TransferStats {
        TransferStats::new(self.cable, self.byte_count, self.elapsed)
    }

    /// Whether `data` holds the entire message.
    #[inline]
    pub fn is_complete_capture(&self) -> bool {
        self.data.len() == self.byte_count
    }
}

type CompletionCallback = Box<dyn FnMut(SysexSummary) + Send>;

pub struct SysexReceiver {
    receptions: [Option<SysexReception>; MAX_CABLES as usize],
    capture_limit: usize,
    on_complete: Option<CompletionCallback>,
    completed: usize,
}

impl SysexReceiver {
    /// `capture_limit` of 0 counts bytes without keeping any.
    pub fn new(capture_limit: usize) -> Self {
        Self {
            receptions: std::array::from_fn(|_| None),
            capture_limit,
            on_complete: None,
            completed: 0,
        }
    }

    pub fn on_complete(mut self, f: impl FnMut(SysexSummary) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    #[inline]
    pub fn capture_limit(&self) -> usize {
        self.capture_limit
    }

    pub fn reception(&self, cable: u8) -> Option<&SysexReception> {
        self.receptions.get(cable as usize)?.as_ref()
    }

    #[inline]
    pub fn is_receiving(&self, cable: u8) -> bool {
        self.reception(cable).is_some()
    }

    /// Receptions completed so far.
    #[inline]
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Drop every open reception.
    pub fn reset(&mut self) {
        self.receptions.iter_mut().for_each(|slot| *slot = None);
    }

    fn slot(&mut self, cable: u8) -> &mut Option<SysexReception> {
        &mut self.receptions[(cable & 0x0F) as usize]
    }
}

impl PacketHandler for SysexReceiver {
    fn on_sysex_start(&mut self, cable: u8) {
        let capture_limit = self.capture_limit;
        let mut reception = SysexReception::new(cable);
        reception.push(&[SYSEX_START], capture_limit);

        if let Some(old) = self.slot(cable).replace(reception) {
            tracing::warn!(
                "sysex rx restarted on cable {}, dropping {} bytes",
                cable,
                old.byte_count
            );
        }
    }

    fn on_sysex_data(&mut self, data: &[u8], cable: u8) {
        let capture_limit = self.capture_limit;
        match self.slot(cable) {
            Some(reception) => reception.push(data, capture_limit),
            None => tracing::warn!(
                "sysex data on cable {} without start, ignoring {} bytes",
                cable,
                data.len()
            ),
        }
    }

    fn on_sysex_end(&mut self, cable: u8) {
        let capture_limit = self.capture_limit;
        let Some(mut reception) = self.slot(cable).take() else {
            tracing::warn!("sysex end on cable {} without start", cable);
            return;
        };
        reception.push(&[SYSEX_END], capture_limit);

        let summary = SysexSummary {
            cable,
            byte_count: reception.byte_count,
            elapsed: reception.started.elapsed(),
            data: reception.captured,
        };
        tracing::info!("sysex rx done | {}", summary.stats());

        self.completed += 1;
        if let Some(f) = self.on_complete.as_mut() {
            f(summary);
        }
    }
}

impl std::fmt::Debug for SysexReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysexReceiver")
            .field("capture_limit", &self.capture_limit)
            .field("completed", &self.completed)
            .field(
                "receiving",
                &self
                    .receptions
                    .iter()
                    .flatten()
                    .map(|r| r.cable)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
