//! Length-prefixed stream framing.
//!
//! Every message on the wire is a `u64` little-endian length followed by
//! exactly that many payload bytes. Lengths outside `[1, 512 MiB]` are
//! rejected; a zero-byte read on the length prefix reports the peer gone.
//! Read/write deadlines are socket properties installed by the session
//! setup, not by this module.

use crate::config::FRAME_MAX;
use crate::net::NetError;
use std::io::{self, Read, Write};

/// Encodes `payload` as an in-memory frame (length prefix + bytes).
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Decodes an in-memory frame, validating the length prefix against the
/// actual remainder.
pub fn decode_frame(buf: &[u8]) -> Result<Vec<u8>, NetError> {
    if buf.len() < 8 {
        return Err(NetError::PeerReset);
    }
    let len = u64::from_le_bytes(buf[..8].try_into().unwrap_or_default());
    if len == 0 || len > FRAME_MAX || len != (buf.len() - 8) as u64 {
        return Err(NetError::InvalidLength(len));
    }
    Ok(buf[8..].to_vec())
}

/// Writes one frame and flushes the stream.
pub fn write_frame(w: &mut impl Write, payload: &[u8]) -> Result<(), NetError> {
    let len = payload.len() as u64;
    if len == 0 || len > FRAME_MAX {
        return Err(NetError::InvalidLength(len));
    }
    w.write_all(&len.to_le_bytes())?;
    w.write_all(payload)?;
    w.flush()?;
    Ok(())
}

/// Reads one frame.
///
/// End-of-stream on the length prefix maps to [`NetError::PeerReset`];
/// a length of zero or beyond the cap maps to [`NetError::InvalidLength`].
pub fn read_frame(r: &mut impl Read) -> Result<Vec<u8>, NetError> {
    let mut len_bytes = [0u8; 8];
    match r.read_exact(&mut len_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(NetError::PeerReset),
        Err(e) => return Err(NetError::Io(e)),
    }
    let len = u64::from_le_bytes(len_bytes);
    if len == 0 || len > FRAME_MAX {
        return Err(NetError::InvalidLength(len));
    }
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload)?;
    Ok(payload)
}
