//! Canonical binary serialization of [`Object`]s.
//!
//! The layout is shared by snapshot frames and by the `DUMP`/`RESTORE`
//! commands. All integers are little-endian:
//!
//! ```text
//! u8   key_len
//! ...  key (key_len bytes)
//! i64  access_times
//! i64  last_access
//! u8   field tag (0 = integer, 1 = decimal, 2 = string)
//! i64  value                      -- integer
//! u64  bit pattern                -- decimal (IEEE-754 binary64)
//! u64  value_len, then the bytes  -- string
//! ```
//!
//! The codec validates structure only; metadata semantics (monotonicity,
//! counter ranges) are the caller's concern.

use crate::config::{KEY_LEN_MAX, STRING_LEN_MAX};
use crate::object::{Field, Metadata, Object, TAG_DECIMAL, TAG_INTEGER, TAG_STRING};
use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Structural failures while encoding or decoding an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Key longer than 255 bytes or string payload longer than `u32::MAX`.
    TypeOverflow,
    /// Input ended before the layout was complete.
    EndOfStream,
    /// Unknown field tag in the input.
    UnsupportedType(u8),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::TypeOverflow => write!(f, "value too large for type"),
            CodecError::EndOfStream => write!(f, "unexpected end of stream"),
            CodecError::UnsupportedType(tag) => write!(f, "unsupported field tag {tag}"),
        }
    }
}

impl std::error::Error for CodecError {}

// ─────────────────────────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Serializes `obj` into its canonical byte layout.
pub fn serialize(obj: &Object) -> Result<Vec<u8>, CodecError> {
    if obj.key.len() > KEY_LEN_MAX {
        return Err(CodecError::TypeOverflow);
    }
    if let Field::String(s) = &obj.field {
        if s.len() as u64 > STRING_LEN_MAX {
            return Err(CodecError::TypeOverflow);
        }
    }

    let mut out = Vec::with_capacity(obj.size() as usize);
    out.push(obj.key.len() as u8);
    out.extend_from_slice(&obj.key);
    out.extend_from_slice(&obj.metadata.access_times.to_le_bytes());
    out.extend_from_slice(&obj.metadata.last_access.to_le_bytes());
    out.push(obj.field.tag());
    match &obj.field {
        Field::Integer(v) => out.extend_from_slice(&v.to_le_bytes()),
        Field::Decimal(v) => out.extend_from_slice(&v.to_bits().to_le_bytes()),
        Field::String(s) => {
            out.extend_from_slice(&(s.len() as u64).to_le_bytes());
            out.extend_from_slice(s);
        }
    }
    Ok(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────────────────────────

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(n).ok_or(CodecError::EndOfStream)?;
        if end > self.buf.len() {
            return Err(CodecError::EndOfStream);
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn i64(&mut self) -> Result<i64, CodecError> {
        let mut word = [0u8; 8];
        word.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(word))
    }

    fn u64(&mut self) -> Result<u64, CodecError> {
        let mut word = [0u8; 8];
        word.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(word))
    }
}

/// Deserializes an object from its canonical byte layout.
///
/// Trailing bytes after the decoded object are ignored; snapshot frames
/// carry exactly one object per frame.
pub fn deserialize(buf: &[u8]) -> Result<Object, CodecError> {
    let mut cur = Cursor::new(buf);

    let key_len = cur.u8()? as usize;
    let key = cur.take(key_len)?.to_vec();
    let access_times = cur.i64()?;
    let last_access = cur.i64()?;
    let tag = cur.u8()?;

    let field = match tag {
        TAG_INTEGER => Field::Integer(cur.i64()?),
        TAG_DECIMAL => Field::Decimal(f64::from_bits(cur.u64()?)),
        TAG_STRING => {
            let len = cur.u64()?;
            if len > STRING_LEN_MAX {
                return Err(CodecError::TypeOverflow);
            }
            Field::String(cur.take(len as usize)?.to_vec())
        }
        other => return Err(CodecError::UnsupportedType(other)),
    };

    Ok(Object {
        key,
        field,
        metadata: Metadata {
            access_times,
            last_access,
        },
    })
}
