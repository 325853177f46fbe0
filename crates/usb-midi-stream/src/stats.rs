//! Transfer timing for completed sysex transmissions and receptions.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStats {
    pub cable: u8,
    /// Total bytes including the `F0`/`F7` framing.
    pub byte_count: usize,
    pub elapsed: Duration,
}

impl TransferStats {
    pub fn new(cable: u8, byte_count: usize, elapsed: Duration) -> Self {
        Self {
            cable,
            byte_count,
            elapsed,
        }
    }

    /// Whole milliseconds, as reported in the completion log line.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }

    /// Throughput over whole milliseconds. 0 when the transfer took less than 1 ms.
    pub fn bytes_per_second(&self) -> u64 {
        let ms = self.elapsed_ms();
        if ms == 0 {
            0
        } else {
            self.byte_count as u64 * 1000 / ms
        }
    }
}

impl fmt::Display for TransferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cable {} | {} bytes in {} ms | {} bytes/s",
            self.cable,
            self.byte_count,
            self.elapsed_ms(),
            self.bytes_per_second()
        )
    }
}
