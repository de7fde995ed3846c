//! Routes frames between a CAN socket and a UDP socket.

use anyhow::{Result, bail};
use clap::Parser;

use can_gateway::{CanTransport, Direction, Gateway, GatewayOptions, UdpTransport};
use can_gateway_cli::{RECEIVE_TIMEOUT, init_tracing, wait_for_enter};

#[derive(Parser)]
#[command(version, about = "CAN to UDP gateway")]
struct Cli {
    /// Route frames from CAN to UDP.
    #[arg(short, long)]
    listen: bool,

    /// Route frames from UDP to CAN.
    #[arg(short, long)]
    send: bool,

    /// Enable realtime scheduling policy for the routing threads.
    #[arg(short, long)]
    realtime: bool,

    /// Prefix UDP payload with the CAN receive timestamp.
    #[arg(short, long)]
    timestamp: bool,

    /// Remote device IP.
    #[arg(short, long)]
    ip: String,

    /// UDP data port.
    #[arg(short, long)]
    port: u16,

    /// CAN device name.
    #[arg(short, long, default_value = "can0")]
    device: String,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let direction = match (cli.listen, cli.send) {
        (true, true) => Direction::Duplex,
        (true, false) => Direction::CanToUdp,
        (false, true) => Direction::UdpToCan,
        (false, false) => bail!("mode must be specified, use --listen and/or --send"),
    };

    let can = CanTransport::open(&cli.device)?;
    if cli.listen {
        can.bind()?;
        can.set_receive_timeout(RECEIVE_TIMEOUT)?;
    }
    if cli.timestamp {
        can.set_receive_timestamp(true)?;
    }

    // Transmit frames to the remote device.
    let udp = UdpTransport::open(&cli.ip, cli.port)?;
    if cli.send {
        // Receive frames from the remote device.
        udp.bind_any(cli.port)?;
        udp.set_receive_timeout(RECEIVE_TIMEOUT)?;
    }

    let mut gateway = Gateway::start(
        can,
        udp,
        GatewayOptions {
            direction,
            timestamp: cli.timestamp,
        },
    )?;

    if cli.realtime {
        if gateway.promote_to_realtime() {
            println!("Gateway thread(s) set to realtime scheduling policy");
        } else {
            println!("Warning: could not set scheduling policy, forgot sudo?");
        }
    }

    println!(
        "Routing frames between {} and {}:{}",
        cli.device, cli.ip, cli.port
    );
    println!("Press enter to stop...");
    wait_for_enter();

    println!("Stopping gateway...");
    gateway.shutdown();
    Ok(())
}
