//! WebSocket frame codec (RFC 6455 §5).
//!
//! # Wire Layout
//! ```text
//!  byte 0: FIN | RSV1-3 | opcode(4)
//!  byte 1: MASK | len7
//!  len7 == 126 → 2-byte big-endian length follows
//!  len7 == 127 → 8-byte big-endian length follows
//!  MASK set   → 4-byte masking key follows
//!  payload (XOR mask[i % 4] when masked)
//! ```
//!
//! # Design Decisions
//! - Decoding is incremental: `Ok(None)` means "need more bytes"
//! - The payload cap is checked against the declared length, before any
//!   payload is buffered
//! - Server frames are encoded unmasked with the shortest length form

use thiserror::Error;

/// Errors that fail the connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame payload of {len} bytes exceeds {limit} bytes")]
    PayloadTooLarge { len: u64, limit: usize },

    #[error("unknown opcode {0:#x}")]
    UnknownOpcode(u8),

    #[error("reserved bits set without a negotiated extension")]
    ReservedBits,

    #[error("control frame is fragmented or longer than 125 bytes")]
    InvalidControlFrame,
}

/// Frame opcodes defined by RFC 6455.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Result<Self, FrameError> {
        match value {
            0x0 => Ok(Opcode::Continuation),
            0x1 => Ok(Opcode::Text),
            0x2 => Ok(Opcode::Binary),
            0x8 => Ok(Opcode::Close),
            0x9 => Ok(Opcode::Ping),
            0xA => Ok(Opcode::Pong),
            other => Err(FrameError::UnknownOpcode(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
        }
    }

    pub fn is_control(self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }

    /// Lowercase name, used as a metrics label.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Continuation => "continuation",
            Opcode::Text => "text",
            Opcode::Binary => "binary",
            Opcode::Close => "close",
            Opcode::Ping => "ping",
            Opcode::Pong => "pong",
        }
    }
}

/// One WebSocket frame. `payload` is always stored unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: Opcode,
    pub fin: bool,
    /// Whether the frame arrived masked on the wire.
    pub masked: bool,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(opcode: Opcode, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            opcode,
            fin: true,
            masked: false,
            payload: payload.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Opcode::Text, text.into().into_bytes())
    }

    pub fn pong(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(Opcode::Pong, payload)
    }

    /// Close frame carrying `code`, or an empty body when `None`.
    pub fn close(code: Option<u16>) -> Self {
        let payload = code.map(|c| c.to_be_bytes().to_vec()).unwrap_or_default();
        Self::new(Opcode::Close, payload)
    }

    /// Status code carried by a close frame, if any.
    pub fn close_code(&self) -> Option<u16> {
        match self.payload.as_slice() {
            [hi, lo, ..] if self.opcode == Opcode::Close => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }
}

/// XOR `payload` in place with the 4-byte masking key. Applying it twice restores the input.
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// Decode one frame from the front of `buf`.
///
/// Returns the frame and the number of bytes it occupied, or `None` when
/// `buf` does not yet hold a complete frame.
pub fn decode(buf: &[u8], max_payload: usize) -> Result<Option<(Frame, usize)>, FrameError> {
    if buf.len() < 2 {
        return Ok(None);
    }

    let fin = buf[0] & 0x80 != 0;
    if buf[0] & 0x70 != 0 {
        return Err(FrameError::ReservedBits);
    }
    let opcode = Opcode::from_u8(buf[0] & 0x0F)?;
    let masked = buf[1] & 0x80 != 0;

    let (len, mut offset) = match buf[1] & 0x7F {
        126 => {
            if buf.len() < 4 {
                return Ok(None);
            }
            (u16::from_be_bytes([buf[2], buf[3]]) as u64, 4)
        }
        127 => {
            if buf.len() < 10 {
                return Ok(None);
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&buf[2..10]);
            (u64::from_be_bytes(raw), 10)
        }
        short => (short as u64, 2),
    };

    if opcode.is_control() && (!fin || len > 125) {
        return Err(FrameError::InvalidControlFrame);
    }
    if len > max_payload as u64 {
        return Err(FrameError::PayloadTooLarge {
            len,
            limit: max_payload,
        });
    }
    let len = len as usize;

    let mask = if masked {
        if buf.len() < offset + 4 {
            return Ok(None);
        }
        let key = [buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]];
        offset += 4;
        Some(key)
    } else {
        None
    };

    if buf.len() < offset + len {
        return Ok(None);
    }

    let mut payload = buf[offset..offset + len].to_vec();
    if let Some(key) = mask {
        apply_mask(&mut payload, key);
    }

    Ok(Some((
        Frame {
            opcode,
            fin,
            masked,
            payload,
        },
        offset + len,
    )))
}

fn encode_header(frame: &Frame, mask: Option<[u8; 4]>) -> Vec<u8> {
    let len = frame.payload.len();
    let mut out = Vec::with_capacity(14 + len);

    let fin = if frame.fin { 0x80 } else { 0x00 };
    out.push(fin | frame.opcode.as_u8());

    let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
    if len < 126 {
        out.push(mask_bit | len as u8);
    } else if len <= u16::MAX as usize {
        out.push(mask_bit | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(mask_bit | 127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    if let Some(key) = mask {
        out.extend_from_slice(&key);
    }
    out
}

/// Encode a server-to-client frame (unmasked).
pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut out = encode_header(frame, None);
    out.extend_from_slice(&frame.payload);
    out
}

/// Encode a client-to-server frame masked with `key`.
pub fn encode_masked(frame: &Frame, key: [u8; 4]) -> Vec<u8> {
    let mut out = encode_header(frame, Some(key));
    let start = out.len();
    out.extend_from_slice(&frame.payload);
    apply_mask(&mut out[start..], key);
    out
}
