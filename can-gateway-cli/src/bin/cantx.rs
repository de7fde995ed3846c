//! One-time or cyclic transmission of a single frame.

use std::os::unix::thread::JoinHandleExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use embedded_can::{Frame as _, StandardId};

use can_gateway::{CanTransport, GatewayFrame, sched};
use can_gateway_cli::{init_tracing, wait_for_enter};

#[derive(Parser)]
#[command(version, about = "Transmit a single CAN frame, once or cyclically")]
struct Cli {
    /// CAN device name.
    #[arg(short, long, default_value = "can0")]
    device: String,

    /// Frame identifier, hex (11-bit standard format).
    #[arg(short, long)]
    id: String,

    /// Payload, hex byte string (e.g. "bbff00").
    #[arg(long, default_value = "")]
    data: String,

    /// Cycle time in milliseconds; transmits until enter is pressed.
    #[arg(short, long)]
    cycle: Option<u64>,

    /// Enable realtime scheduling policy for the cyclic transmit thread.
    #[arg(short, long)]
    realtime: bool,
}

fn build_frame(id: &str, data: &str) -> Result<GatewayFrame> {
    let id = id.trim();
    let raw = u32::from_str_radix(id.strip_prefix("0x").unwrap_or(id), 16)
        .context("frame identifier is not a hex number")?;
    let id = u16::try_from(raw)
        .ok()
        .and_then(StandardId::new)
        .context("frame identifier exceeds the 11-bit standard range")?;

    let data = data.trim();
    if !data.is_ascii() {
        bail!("payload is not a hex byte string");
    }
    if data.len() % 2 != 0 {
        bail!("payload hex string needs an even number of digits");
    }
    let mut payload = Vec::with_capacity(data.len() / 2);
    for byte in 0..data.len() / 2 {
        let digits = &data[byte * 2..byte * 2 + 2];
        payload.push(u8::from_str_radix(digits, 16).context("payload is not a hex byte string")?);
    }

    GatewayFrame::new(id, &payload).context("payload exceeds 8 bytes")
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let frame = build_frame(&cli.id, &cli.data)?;
    let can = CanTransport::open(&cli.device)?;

    let Some(cycle) = cli.cycle else {
        can.transmit(&frame)?;
        println!("Transmitted on {}: {}", cli.device, frame);
        return Ok(());
    };
    if cycle == 0 {
        bail!("cycle time must be larger than 0");
    }

    let stop = Arc::new(AtomicBool::new(false));
    let handle = thread::Builder::new().name("cyclic-tx".into()).spawn({
        let stop = stop.clone();
        move || {
            while !stop.load(Ordering::Relaxed) {
                if let Err(err) = can.transmit(&frame) {
                    eprintln!("transmit failed: {err}");
                }
                thread::sleep(Duration::from_millis(cycle));
            }
        }
    })?;

    if cli.realtime && !sched::set_realtime(handle.as_pthread_t()) {
        println!("Warning: could not set scheduling policy, forgot sudo?");
    }

    println!(
        "Transmitting on {} every {} ms: {}",
        cli.device, cycle, frame
    );
    println!("Press enter to stop...");
    wait_for_enter();

    stop.store(true, Ordering::Relaxed);
    let _ = handle.join();
    Ok(())
}
