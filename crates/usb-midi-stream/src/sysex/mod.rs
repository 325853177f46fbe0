//! Sysex transmission and reception.

mod cables;
mod receiver;
mod source;
mod transmitter;

pub use cables::CableTransmitters;
pub use receiver::{SysexReceiver, SysexReception, SysexSummary};
pub use source::{SysexBuffer, SysexGenerator, SysexSource};
pub use transmitter::{SysexTransmitter, TxProgress};
