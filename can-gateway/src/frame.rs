//! The gateway's frame type and its wire encodings.
//!
//! Two fixed layouts travel over the UDP link: the plain 16-byte frame
//! record, and the timestamp-framed variant that prefixes the record with
//! the frame's kernel receive time in milliseconds. Both endpoints must be
//! configured for the same layout out of band; nothing on the wire marks
//! the mode.

use std::fmt;

use embedded_can::{Frame as EmbeddedFrame, Id};

/// Maximum payload length of a classic CAN frame.
pub const MAX_DATA_LEN: usize = 8;

/// Wire size of one frame record: `id: u32 | dlc: u8 | pad: [u8; 3] | data: [u8; 8]`.
pub const FRAME_WIRE_LEN: usize = 16;

/// Wire size of a timestamp-framed record: `time_ms: u64` followed by the frame record.
pub const TIMESTAMPED_WIRE_LEN: usize = 8 + FRAME_WIRE_LEN;

/// A classic CAN frame as routed by the gateway.
///
/// The identifier field carries the raw kernel `can_id` value, including the
/// EFF/RTR/ERR flag bits, so frames forwarded between the CAN interface and
/// the UDP peer stay bit-identical. Payload bytes beyond `dlc` are zeroed and
/// never interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GatewayFrame {
    id: u32,
    dlc: u8,
    data: [u8; MAX_DATA_LEN],
}

impl GatewayFrame {
    /// Builds a frame from a raw identifier field and payload slice.
    ///
    /// Returns `None` if the payload exceeds [`MAX_DATA_LEN`].
    pub fn from_raw(id: u32, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_DATA_LEN {
            return None;
        }
        let mut buf = [0u8; MAX_DATA_LEN];
        buf[..data.len()].copy_from_slice(data);
        Some(Self {
            id,
            dlc: data.len() as u8,
            data: buf,
        })
    }

    /// Raw identifier field, flag bits included.
    pub fn raw_id(&self) -> u32 {
        self.id
    }

    pub(crate) fn from_parts(id: u32, dlc: u8, data: [u8; MAX_DATA_LEN]) -> Option<Self> {
        if dlc as usize > MAX_DATA_LEN {
            return None;
        }
        let mut frame = Self { id, dlc, data };
        // Keep the unused tail defined so equal frames compare equal.
        frame.data[dlc as usize..].fill(0);
        Some(frame)
    }
}

impl EmbeddedFrame for GatewayFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        Self::from_raw(raw_id_for(id.into()), data)
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > MAX_DATA_LEN {
            return None;
        }
        Some(Self {
            id: raw_id_for(id.into()) | libc::CAN_RTR_FLAG,
            dlc: dlc as u8,
            data: [0u8; MAX_DATA_LEN],
        })
    }

    fn is_extended(&self) -> bool {
        self.id & libc::CAN_EFF_FLAG != 0
    }

    fn is_remote_frame(&self) -> bool {
        self.id & libc::CAN_RTR_FLAG != 0
    }

    fn id(&self) -> Id {
        if self.is_extended() {
            let raw = self.id & libc::CAN_EFF_MASK;
            Id::Extended(embedded_can::ExtendedId::new(raw).expect("masked to 29 bits"))
        } else {
            let raw = (self.id & libc::CAN_SFF_MASK) as u16;
            Id::Standard(embedded_can::StandardId::new(raw).expect("masked to 11 bits"))
        }
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        if self.is_remote_frame() {
            &[]
        } else {
            &self.data[..self.dlc as usize]
        }
    }
}

impl fmt::Display for GatewayFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_extended() {
            write!(f, "{:08X}", self.id & libc::CAN_EFF_MASK)?;
        } else {
            write!(f, "{:03X}", self.id & libc::CAN_SFF_MASK)?;
        }
        write!(f, "  [{}]", self.dlc)?;
        for byte in &self.data[..self.dlc as usize] {
            write!(f, " {byte:02x}")?;
        }
        Ok(())
    }
}

fn raw_id_for(id: Id) -> u32 {
    match id {
        Id::Standard(id) => id.as_raw() as u32,
        Id::Extended(id) => id.as_raw() | libc::CAN_EFF_FLAG,
    }
}

/// Packs a frame into the fixed 16-byte record, little-endian fields.
pub fn encode_frame_into(out: &mut [u8; FRAME_WIRE_LEN], frame: &GatewayFrame) {
    out.fill(0);
    out[0..4].copy_from_slice(&frame.id.to_le_bytes());
    out[4] = frame.dlc;
    let dlc = frame.dlc as usize;
    out[8..8 + dlc].copy_from_slice(&frame.data[..dlc]);
}

/// Unpacks a 16-byte record into a frame.
///
/// Any other buffer length, or a length code above 8, is rejected whole.
pub fn decode_frame(buf: &[u8]) -> Result<GatewayFrame, &'static str> {
    if buf.len() != FRAME_WIRE_LEN {
        return Err("invalid frame record length");
    }
    let id = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    let dlc = buf[4];
    if dlc as usize > MAX_DATA_LEN {
        return Err("invalid length code");
    }
    let mut data = [0u8; MAX_DATA_LEN];
    data[..dlc as usize].copy_from_slice(&buf[8..8 + dlc as usize]);
    GatewayFrame::from_parts(id, dlc, data).ok_or("invalid frame")
}

/// Packs a receive timestamp (milliseconds) and a frame into the 24-byte record.
pub fn encode_timestamped_into(
    out: &mut [u8; TIMESTAMPED_WIRE_LEN],
    time_ms: u64,
    frame: &GatewayFrame,
) {
    out[0..8].copy_from_slice(&time_ms.to_le_bytes());
    let mut record = [0u8; FRAME_WIRE_LEN];
    encode_frame_into(&mut record, frame);
    out[8..].copy_from_slice(&record);
}

/// Unpacks a 24-byte timestamped record into its timestamp and frame.
///
/// Any other buffer length is rejected whole, never partially interpreted.
pub fn decode_timestamped(buf: &[u8]) -> Result<(u64, GatewayFrame), &'static str> {
    if buf.len() != TIMESTAMPED_WIRE_LEN {
        return Err("invalid timestamped record length");
    }
    let time_ms = u64::from_le_bytes(buf[0..8].try_into().unwrap());
    let frame = decode_frame(&buf[8..])?;
    Ok((time_ms, frame))
}
