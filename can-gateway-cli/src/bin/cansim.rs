//! Transmits synthetic cyclic CAN traffic to a UDP peer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use embedded_can::{Frame as _, StandardId};

use can_gateway::{GatewayFrame, UdpTransport};
use can_gateway_cli::{init_tracing, wait_for_enter};

#[derive(Parser)]
#[command(version, about = "Simulate cyclic CAN traffic over UDP")]
struct Cli {
    /// Remote device IP.
    #[arg(short, long)]
    ip: String,

    /// UDP data port.
    #[arg(short, long)]
    port: u16,
}

fn example_frame(id: u16, data: &[u8]) -> Result<GatewayFrame> {
    let id = StandardId::new(id).context("identifier outside the standard range")?;
    GatewayFrame::new(id, data).context("payload exceeds 8 bytes")
}

fn simulate(udp: &UdpTransport, stop: &AtomicBool, frame_a: GatewayFrame, frame_b: GatewayFrame) {
    let started = Instant::now();
    let mut tick: u64 = 0;

    while !stop.load(Ordering::Relaxed) {
        // Transmit scheduling on a 1 ms tick.
        if tick % 200 == 0 {
            let _ = udp.transmit(&frame_a); // 200 ms cycle time
        }
        if tick % 25 == 0 {
            let _ = udp.transmit(&frame_b); // 25 ms cycle time
        }

        tick += 1;
        let next_cycle = started + Duration::from_millis(tick);
        if let Some(remaining) = next_cycle.checked_duration_since(Instant::now()) {
            thread::sleep(remaining);
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let frame_a = example_frame(0x0C9, &[0xFF, 0xBB, 0x00, 0x00])?;
    let frame_b = example_frame(0x1D2, &[0xBB, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00])?;

    let udp = UdpTransport::open(&cli.ip, cli.port)?;

    let stop = Arc::new(AtomicBool::new(false));
    let handle = thread::Builder::new().name("can-sim".into()).spawn({
        let stop = stop.clone();
        move || simulate(&udp, &stop, frame_a, frame_b)
    })?;

    println!("Simulating CAN traffic towards {}:{}", cli.ip, cli.port);
    println!("Press enter to stop...");
    wait_for_enter();

    stop.store(true, Ordering::Relaxed);
    let _ = handle.join();
    Ok(())
}
