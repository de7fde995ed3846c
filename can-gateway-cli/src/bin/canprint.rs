//! Prints received CAN frames with their kernel receive timestamps.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::Result;
use clap::Parser;

use can_gateway::{CanTransport, RecvStatus};
use can_gateway_cli::{RECEIVE_TIMEOUT, init_tracing, wait_for_enter};

#[derive(Parser)]
#[command(version, about = "Print CAN frames to the console")]
struct Cli {
    /// CAN device name.
    #[arg(short, long, default_value = "can0")]
    device: String,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let can = CanTransport::open(&cli.device)?;
    can.bind()?;
    can.set_receive_timeout(RECEIVE_TIMEOUT)?;
    can.set_receive_timestamp(true)?;

    let stop = Arc::new(AtomicBool::new(false));
    let handle = thread::Builder::new().name("can-print".into()).spawn({
        let stop = stop.clone();
        move || {
            while !stop.load(Ordering::Relaxed) {
                match can.receive_timestamped() {
                    Ok(RecvStatus::Received((frame, time_ms))) => {
                        println!("{:>13}  {frame}", time_ms.unwrap_or(0));
                    }
                    Ok(_) => {}
                    Err(err) => eprintln!("receive failed: {err}"),
                }
            }
        }
    })?;

    println!("Printing frames received on {}", cli.device);
    println!("Press enter to stop...");
    wait_for_enter();

    stop.store(true, Ordering::Relaxed);
    let _ = handle.join();
    Ok(())
}
