//! Raw SocketCAN transport.
//!
//! Wraps an `AF_CAN`/`CAN_RAW` socket bound to one network interface. The
//! socket stays blocking; a receive timeout (`SO_RCVTIMEO`) bounds every
//! receive so routing loops can observe a stop request in finite time.

use std::io;
use std::mem::{self, size_of};
use std::os::fd::AsRawFd;
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use socketcan::CanAddr;

use crate::RecvStatus;
use crate::errors::TransportError;
use crate::frame::{FRAME_WIRE_LEN, GatewayFrame, decode_frame, encode_frame_into};

/// A raw CAN socket fixed to one interface.
pub struct CanTransport {
    socket: Socket,
    addr: SockAddr,
}

impl CanTransport {
    /// Opens a raw CAN socket and resolves `device` to an interface index.
    ///
    /// The socket is not bound yet; binding is only needed for receiving.
    pub fn open(device: &str) -> Result<Self, TransportError> {
        if device.is_empty() {
            return Err(TransportError::Config("device name must not be empty"));
        }
        if device.len() >= libc::IFNAMSIZ {
            return Err(TransportError::Config("device name too long"));
        }

        let socket = Socket::new(
            Domain::from(libc::AF_CAN),
            Type::RAW,
            Some(Protocol::from(libc::CAN_RAW)),
        )?;
        let addr = CanAddr::from_iface(device)?;

        Ok(Self {
            socket,
            addr: addr.into_sock_addr(),
        })
    }

    /// Binds the socket to the resolved interface for receiving.
    pub fn bind(&self) -> Result<(), TransportError> {
        self.socket.bind(&self.addr)?;
        Ok(())
    }

    /// Configures the blocking-receive deadline. Must be non-zero.
    pub fn set_receive_timeout(&self, timeout: Duration) -> Result<(), TransportError> {
        if timeout.is_zero() {
            return Err(TransportError::Config("receive timeout must be non-zero"));
        }
        self.socket.set_read_timeout(Some(timeout))?;
        Ok(())
    }

    /// Toggles kernel delivery of receive timestamps as ancillary data.
    pub fn set_receive_timestamp(&self, enable: bool) -> Result<(), TransportError> {
        let value: libc::c_int = if enable { 1 } else { 0 };
        let res = unsafe {
            libc::setsockopt(
                self.socket.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_TIMESTAMP,
                &value as *const libc::c_int as *const libc::c_void,
                size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if res < 0 {
            return Err(TransportError::Io(io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Writes one frame record to the interface.
    ///
    /// Addresses the interface explicitly, so an unbound transmit-only
    /// transport works.
    pub fn transmit(&self, frame: &GatewayFrame) -> Result<(), TransportError> {
        let mut record = [0u8; FRAME_WIRE_LEN];
        encode_frame_into(&mut record, frame);
        let sent = self.socket.send_to(&record, &self.addr)?;
        if sent != FRAME_WIRE_LEN {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                "short frame write",
            )));
        }
        Ok(())
    }

    /// Blocking read of one frame record.
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
                return Ok(frame_status(&record, read as usize));
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

    /// Blocking read of one frame record plus its kernel receive timestamp.
    ///
    /// The timestamp comes from the `SO_TIMESTAMP` ancillary record,
    /// converted to milliseconds. `None` means the kernel supplied no
    /// timestamp for this frame; the value is only ever paired with a
    /// completely received frame.
    pub fn receive_timestamped(
        &self,
    ) -> Result<RecvStatus<(GatewayFrame, Option<u64>)>, TransportError> {
        let mut record = [0u8; FRAME_WIRE_LEN];
        // u64-backed so the control buffer meets cmsghdr alignment.
        let mut control = [0u64; 8];

        loop {
            let mut iov = libc::iovec {
                iov_base: record.as_mut_ptr().cast(),
                iov_len: record.len(),
            };
            let mut msg: libc::msghdr = unsafe { mem::zeroed() };
            msg.msg_iov = &mut iov;
            msg.msg_iovlen = 1;
            msg.msg_control = control.as_mut_ptr().cast();
            msg.msg_controllen = size_of::<[u64; 8]>() as _;

            let read = unsafe { libc::recvmsg(self.socket.as_raw_fd(), &mut msg, 0) };
            if read >= 0 {
                return Ok(match frame_status(&record, read as usize) {
                    RecvStatus::Received(frame) => {
                        RecvStatus::Received((frame, receive_time_ms(&msg)))
                    }
                    RecvStatus::TimedOut => RecvStatus::TimedOut,
                    RecvStatus::Discarded => RecvStatus::Discarded,
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

fn frame_status(record: &[u8; FRAME_WIRE_LEN], read: usize) -> RecvStatus<GatewayFrame> {
    if read != FRAME_WIRE_LEN {
        return RecvStatus::Discarded;
    }
    match decode_frame(record) {
        Ok(frame) => RecvStatus::Received(frame),
        Err(_) => RecvStatus::Discarded,
    }
}

/// Scans ancillary records for an `SCM_TIMESTAMP` and converts it to
/// milliseconds (`sec * 1000 + usec / 1000`).
fn receive_time_ms(msg: &libc::msghdr) -> Option<u64> {
    let mut time_ms = None;
    let mut cmsg = unsafe { libc::CMSG_FIRSTHDR(msg) };
    while !cmsg.is_null() {
        let header = unsafe { &*cmsg };
        if header.cmsg_level == libc::SOL_SOCKET && header.cmsg_type == libc::SCM_TIMESTAMP {
            let mut tv: libc::timeval = unsafe { mem::zeroed() };
            unsafe {
                std::ptr::copy_nonoverlapping(
                    libc::CMSG_DATA(cmsg) as *const u8,
                    &mut tv as *mut libc::timeval as *mut u8,
                    size_of::<libc::timeval>(),
                );
            }
            time_ms = Some(tv.tv_sec as u64 * 1000 + tv.tv_usec as u64 / 1000);
        }
        cmsg = unsafe { libc::CMSG_NXTHDR(msg, cmsg) };
    }
    time_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_rejects_oversized_device_name() {
        let name = "a".repeat(libc::IFNAMSIZ);
        assert!(matches!(
            CanTransport::open(&name),
            Err(TransportError::Config(_))
        ));
    }

    #[test]
    fn open_rejects_empty_device_name() {
        assert!(matches!(
            CanTransport::open(""),
            Err(TransportError::Config(_))
        ));
    }

    #[test]
    fn open_fails_for_unknown_interface() {
        assert!(CanTransport::open("nonexistent0").is_err());
    }
}
