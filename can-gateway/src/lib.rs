#![warn(missing_docs)]

//! Routes classic CAN frames between a Linux SocketCAN interface and a
//! remote peer over UDP.
//!
//! The gateway extends a CAN network across an IP link for development,
//! diagnostics or testing. It forwards raw frames in one or both directions
//! with minimal added latency and no delivery guarantees beyond what CAN and
//! UDP themselves provide: a frame that arrives while nobody is reading is
//! dropped, exactly as on the underlying buses.
//!
//! - [`CanTransport`] / [`UdpTransport`] wrap the two sockets with blocking
//!   receives bounded by a configurable timeout.
//! - [`frame`] defines the fixed 16-byte frame record and the 24-byte
//!   timestamp-framed variant used on the UDP wire.
//! - [`Gateway`] runs the forwarding loop(s), one OS thread per direction,
//!   stopped cooperatively through a shared flag and joined on shutdown.
//! - [`sched`] offers best-effort promotion of the loop threads to a
//!   realtime scheduling policy.
//!
//! # Quick start
//! ```rust,no_run
//! use std::time::Duration;
//! use can_gateway::{CanTransport, Direction, Gateway, GatewayOptions, UdpTransport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let can = CanTransport::open("can0")?;
//! can.bind()?;
//! can.set_receive_timeout(Duration::from_secs(3))?;
//!
//! let udp = UdpTransport::open("192.168.1.5", 3864)?;
//!
//! let mut gateway = Gateway::start(
//!     can,
//!     udp,
//!     GatewayOptions {
//!         direction: Direction::CanToUdp,
//!         timestamp: false,
//!     },
//! )?;
//!
//! // ... until an operator asks for a stop:
//! gateway.shutdown();
//! # Ok(())
//! # }
//! ```

mod can;
mod errors;
pub mod frame;
mod gateway;
pub mod sched;
mod trace;
mod udp;

pub use crate::can::CanTransport;
pub use crate::errors::TransportError;
pub use crate::frame::GatewayFrame;
pub use crate::gateway::{Direction, Gateway, GatewayOptions};
pub use crate::udp::UdpTransport;

/// Outcome of a blocking receive on a gateway transport.
///
/// Routing loops treat everything but [`RecvStatus::Received`] as "no valid
/// frame this iteration" and poll again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvStatus<T> {
    /// A complete frame was read from the socket.
    Received(T),
    /// The configured receive deadline elapsed before any data arrived.
    TimedOut,
    /// A datagram of unexpected size or content was read and dropped.
    Discarded,
}
