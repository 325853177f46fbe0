//! Sysex echo device on the in-memory transport.
//!
//! The host sends a test-pattern sysex; the device captures it and sends it
//! straight back, then sends a note on/off pair. Run with:
//!
//! ```bash
//! cargo run --example sysex_echo
//! ```

use usb_midi::prelude::*;
use usb_midi::SysexTransmitter;

const SYSEX_ECHO_MAX_LENGTH: usize = 1024;

fn main() -> usb_midi::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let (received_tx, received_rx) = crossbeam_channel::unbounded::<SysexSummary>();
    let (transport, mut host) = memory_transport(1024);
    let device = UsbMidiDevice::builder()
        .capture_limit(SYSEX_ECHO_MAX_LENGTH)
        .on_available(|available| println!("USB MIDI available: {}", available))
        .on_sysex_received(move |summary| {
            let _ = received_tx.send(summary);
        })
        .handler(Handlers::new().message(|bytes, cable| {
            println!("cable {}: {:02x?}", cable, bytes);
        }))
        .build(transport)?;

    let events = device.event_sender();
    let _ = events.send(TransportEvent::Status(UsbStatus::Connected));
    let _ = events.send(TransportEvent::Status(UsbStatus::Configured));
    device.process_events()?;

    // Host side: chunk a 300-byte test pattern into packets for the device
    let (mut scratch, mut scratch_host) = memory_transport(128);
    let mut host_tx = SysexTransmitter::new(0)?;
    host_tx.start(300, SysexGenerator::test_pattern())?;
    while !host_tx.on_transport_ready(&mut scratch)?.is_complete() {}
    for packet in scratch_host.drain() {
        host.send(packet);
    }
    let _ = events.send(TransportEvent::DataReceived);
    device.process_events()?;

    // Echo whatever was captured
    for summary in received_rx.try_iter() {
        if !summary.is_complete_capture() {
            println!(
                "sysex on cable {} too long to echo ({} bytes)",
                summary.cable, summary.byte_count
            );
            continue;
        }
        device.start_sysex_buffer(summary.cable, &summary.data)?;
        while device.is_sending(summary.cable) {
            let _ = events.send(TransportEvent::PacketSent);
            device.process_events()?;
        }
    }

    device.send(0, [0x90, 0x45, 0x7f])?;
    device.send(0, [0x80, 0x45, 0x00])?;

    println!("host received {} packets", host.drain().len());
    Ok(())
}
