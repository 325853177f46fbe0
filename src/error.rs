//! Centralized error type for the usb-midi umbrella crate.
//!
//! Wraps the subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] usb_midi_packet::CodecError),

    #[cfg(feature = "stream")]
    #[error(transparent)]
    Stream(#[from] usb_midi_stream::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
