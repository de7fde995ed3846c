//! UDP transport with a fixed remote peer.
//!
//! The socket is created unbound so a transmit-only gateway never claims a
//! local port; binding is only required when this side also receives.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::os::fd::AsRawFd;
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::RecvStatus;
use crate::errors::TransportError;
use crate::frame::{FRAME_WIRE_LEN, GatewayFrame, decode_frame, encode_frame_into};

/// A UDP socket fixed to one remote peer.
pub struct UdpTransport {
    socket: Socket,
    peer: SockAddr,
    peer_ip: IpAddr,
}

impl UdpTransport {
    /// Opens a UDP socket and fixes the remote peer address used by every
    /// transmit.
    pub fn open(remote_ip: &str, remote_port: u16) -> Result<Self, TransportError> {
        let ip: IpAddr = remote_ip.trim().parse()?;
        let domain = match ip {
            IpAddr::V4(_) => Domain::IPV4,
            IpAddr::V6(_) => Domain::IPV6,
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        Ok(Self {
            socket,
            peer: SockAddr::from(SocketAddr::new(ip, remote_port)),
            peer_ip: ip,
        })
    }

    /// Binds the unspecified local address of the peer's family on
    /// `local_port`. Required before receiving.
    pub fn bind_any(&self, local_port: u16) -> Result<(), TransportError> {
        let ip = match self.peer_ip {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        self.bind_addr(SocketAddr::new(ip, local_port))
    }

    /// Binds a specific local address. Required before receiving.
    pub fn bind(&self, local_ip: &str, local_port: u16) -> Result<(), TransportError> {
        let ip: IpAddr = local_ip.trim().parse()?;
        self.bind_addr(SocketAddr::new(ip, local_port))
    }

    fn bind_addr(&self, addr: SocketAddr) -> Result<(), TransportError> {
        self.socket.bind(&SockAddr::from(addr))?;
        Ok(())
    }

    /// The local address this socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket
            .local_addr()?
            .as_socket()
            .ok_or(TransportError::Config("socket has no inet address"))
    }

    /// Configures the blocking-receive deadline. Must be non-zero.
    pub fn set_receive_timeout(&self, timeout: Duration) -> Result<(), TransportError> {
        if timeout.is_zero() {
            return Err(TransportError::Config("receive timeout must be non-zero"));
        }
        self.socket.set_read_timeout(Some(timeout))?;
        Ok(())
    }

    /// Sends one frame record to the fixed peer.
    pub fn transmit(&self, frame: &GatewayFrame) -> Result<(), TransportError> {
        let mut record = [0u8; FRAME_WIRE_LEN];
        encode_frame_into(&mut record, frame);
        self.transmit_raw(&record)
    }

    /// Sends an arbitrary buffer to the fixed peer (timestamp framing).
    pub fn transmit_raw(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let sent = self.socket.send_to(bytes, &self.peer)?;
        if sent != bytes.len() {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                "short datagram write",
            )));
        }
        Ok(())
    }

    /// Blocking read of one frame record.
    ///
    /// Reads up to the record size; oversized datagrams are truncated by the
    /// kernel, undersized or malformed ones are discarded.
    pub fn receive(&self) -> Result<RecvStatus<GatewayFrame>, TransportError> {
        let mut record = [0u8; FRAME_WIRE_LEN];
        loop {
            let read = unsafe {
                libc::recv(
                    self.socket.as_raw_fd(),
                    record.as_mut_ptr().cast(),
                    record.len(),
                    0,
                )
            };
            if read >= 0 {
                if read as usize != FRAME_WIRE_LEN {
                    return Ok(RecvStatus::Discarded);
                }
                return Ok(match decode_frame(&record) {
                    Ok(frame) => RecvStatus::Received(frame),
                    Err(_) => RecvStatus::Discarded,
                });
            }

            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                    return Ok(RecvStatus::TimedOut);
                }
                _ => return Err(TransportError::Io(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_rejects_malformed_addresses() {
        assert!(matches!(
            UdpTransport::open("", 3864),
            Err(TransportError::Addr(_))
        ));
        assert!(matches!(
            UdpTransport::open("not-an-ip", 3864),
            Err(TransportError::Addr(_))
        ));
    }

    #[test]
    fn zero_receive_timeout_is_rejected() {
        let udp = UdpTransport::open("127.0.0.1", 3864).unwrap();
        assert!(matches!(
            udp.set_receive_timeout(Duration::ZERO),
            Err(TransportError::Config(_))
        ));
    }
}
