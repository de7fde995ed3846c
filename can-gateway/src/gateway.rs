//! The routing engine.
//!
//! Owns up to two forwarding loops, each on its own OS thread, coupled only
//! through the shared transports and one stop flag. Frames are forwarded
//! best-effort: a timeout, runt datagram or transient send failure never
//! stops a loop.

use std::io;
use std::os::unix::thread::JoinHandleExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::RecvStatus;
use crate::can::CanTransport;
use crate::frame::{TIMESTAMPED_WIRE_LEN, encode_timestamped_into};
use crate::sched;
use crate::trace::{trace, warn};
use crate::udp::UdpTransport;

/// Forwarding direction(s) of a gateway instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Forward frames received on the CAN interface to the UDP peer.
    CanToUdp,
    /// Forward frames received from the UDP peer to the CAN interface.
    UdpToCan,
    /// Both directions, on two independent loops.
    Duplex,
}

impl Direction {
    fn routes_to_udp(self) -> bool {
        matches!(self, Direction::CanToUdp | Direction::Duplex)
    }

    fn routes_to_can(self) -> bool {
        matches!(self, Direction::UdpToCan | Direction::Duplex)
    }
}

/// Configuration for [`Gateway::start`].
#[derive(Debug, Clone, Copy)]
pub struct GatewayOptions {
    /// Which loop(s) to run.
    pub direction: Direction,
    /// Prefix CAN-origin frames with their kernel receive timestamp on the
    /// wire. Both endpoints must agree on this out of band.
    pub timestamp: bool,
}

/// A running gateway.
///
/// Owns the transports (via the loops' shared references) and the loop join
/// handles; [`Gateway::shutdown`] joins every loop before the transports can
/// be dropped.
pub struct Gateway {
    stop: Arc<AtomicBool>,
    to_udp: Option<JoinHandle<()>>,
    to_can: Option<JoinHandle<()>>,
}

impl Gateway {
    /// Takes ownership of both transports and spawns the configured loop(s).
    ///
    /// The transports must already be opened, bound and configured with
    /// receive timeouts; the timeout bounds how long a loop takes to notice
    /// a stop request.
    pub fn start(
        can: CanTransport,
        udp: UdpTransport,
        options: GatewayOptions,
    ) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let can = Arc::new(can);
        let udp = Arc::new(udp);

        let mut gateway = Self {
            stop: stop.clone(),
            to_udp: None,
            to_can: None,
        };

        if options.direction.routes_to_udp() {
            let (can, udp, stop) = (can.clone(), udp.clone(), stop.clone());
            let timestamp = options.timestamp;
            let handle = thread::Builder::new()
                .name("can-to-udp".into())
                .spawn(move || route_to_udp(&can, &udp, &stop, timestamp));
            match handle {
                Ok(handle) => gateway.to_udp = Some(handle),
                Err(err) => {
                    gateway.shutdown();
                    return Err(err);
                }
            }
        }

        if options.direction.routes_to_can() {
            let handle = thread::Builder::new()
                .name("udp-to-can".into())
                .spawn(move || route_to_can(&can, &udp, &stop));
            match handle {
                Ok(handle) => gateway.to_can = Some(handle),
                Err(err) => {
                    gateway.shutdown();
                    return Err(err);
                }
            }
        }

        Ok(gateway)
    }

    /// Promotes every active loop thread to a realtime scheduling policy.
    ///
    /// Returns true only if all promotions took effect. Failure (typically
    /// missing privilege) leaves the loops on the default policy.
    pub fn promote_to_realtime(&self) -> bool {
        let mut promoted = true;
        if let Some(handle) = &self.to_udp {
            promoted &= sched::set_realtime(handle.as_pthread_t());
        }
        if let Some(handle) = &self.to_can {
            promoted &= sched::set_realtime(handle.as_pthread_t());
        }
        promoted
    }

    /// Requests a stop and joins every loop.
    ///
    /// Each loop notices the request within at most one receive-timeout
    /// interval. Idempotent; a stopped gateway cannot be restarted.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.to_udp.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.to_can.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn route_to_udp(can: &CanTransport, udp: &UdpTransport, stop: &AtomicBool, timestamp: bool) {
    if timestamp {
        // Pass-through of the original receive timestamp for more accurate
        // timing information on the remote side.
        let mut record = [0u8; TIMESTAMPED_WIRE_LEN];
        while !stop.load(Ordering::Relaxed) {
            match can.receive_timestamped() {
                Ok(RecvStatus::Received((frame, time_ms))) => {
                    let time_ms = time_ms.unwrap_or_else(wall_clock_ms);
                    encode_timestamped_into(&mut record, time_ms, &frame);
                    if let Err(_err) = udp.transmit_raw(&record) {
                        warn!(error = %_err, "dropping frame: udp transmit failed");
                    }
                }
                Ok(_) => {}
                Err(_err) => {
                    trace!(error = %_err, "can receive failed");
                }
            }
        }
    } else {
        while !stop.load(Ordering::Relaxed) {
            match can.receive() {
                Ok(RecvStatus::Received(frame)) => {
                    if let Err(_err) = udp.transmit(&frame) {
                        warn!(error = %_err, "dropping frame: udp transmit failed");
                    }
                }
                Ok(_) => {}
                Err(_err) => {
                    trace!(error = %_err, "can receive failed");
                }
            }
        }
    }
}

fn route_to_can(can: &CanTransport, udp: &UdpTransport, stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        match udp.receive() {
            Ok(RecvStatus::Received(frame)) => {
                if let Err(_err) = can.transmit(&frame) {
                    warn!(error = %_err, "dropping frame: can transmit failed");
                }
            }
            Ok(_) => {}
            Err(_err) => {
                trace!(error = %_err, "udp receive failed");
            }
        }
    }
}

/// Wall-clock milliseconds, substituted when the kernel supplied no receive
/// timestamp for a frame.
fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
