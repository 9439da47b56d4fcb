//! Session transport: length-prefixed frames, AEAD, handshake, auth.
//!
//! Layering, inner to outer:
//!
//! 1. every logical message is a plain frame (`u64le length || payload`);
//! 2. on an encrypted session the plain frame is sealed into
//!    `nonce || tag || ciphertext`;
//! 3. the sealed blob travels inside an outer plain frame.
//!
//! [`send_message`] / [`recv_message`] compose the layers so callers see
//! logical payloads only. Handshake and auth tokens are defined in
//! [`handshake`].

pub mod cipher;
pub mod client;
pub mod frame;
pub mod handshake;

pub use cipher::SessionCipher;
pub use client::{ConnectOptions, Connection};

use std::fmt;
use std::io::{self, Read, Write};

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Transport-layer failures.
#[derive(Debug)]
pub enum NetError {
    /// Frame length of zero or above the 512 MiB cap.
    InvalidLength(u64),
    /// Zero bytes read on a length prefix: the peer reset the stream.
    PeerReset,
    /// AEAD frame too short or failed authentication.
    DecryptionFail,
    /// AEAD sealing failed (payload beyond cipher limits).
    CipherFail,
    /// The key-exchange dialogue broke protocol.
    HandshakeFail,
    /// Password rejected by the server.
    AuthFail,
    /// The server speaks a different protocol version.
    UnmatchVersion,
    /// Underlying socket failure.
    Io(io::Error),
}

impl NetError {
    /// `true` when the error is a socket deadline expiry; connection loops
    /// retry these rather than closing.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            NetError::Io(e) if e.kind() == io::ErrorKind::WouldBlock
                || e.kind() == io::ErrorKind::TimedOut
        )
    }
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::InvalidLength(len) => write!(f, "invalid frame length {len}"),
            NetError::PeerReset => write!(f, "no-connection"),
            NetError::DecryptionFail => write!(f, "decryption-fail"),
            NetError::CipherFail => write!(f, "cipher failure"),
            NetError::HandshakeFail => write!(f, "tls-handshake-fail"),
            NetError::AuthFail => write!(f, "auth-fail"),
            NetError::UnmatchVersion => write!(f, "unmatch version"),
            NetError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for NetError {}

impl From<io::Error> for NetError {
    fn from(e: io::Error) -> Self {
        NetError::Io(e)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message layer
// ─────────────────────────────────────────────────────────────────────────────

/// Sends one logical message, sealing it when `cipher` is present.
pub fn send_message(
    w: &mut impl Write,
    cipher: Option<&mut SessionCipher>,
    payload: &[u8],
) -> Result<(), NetError> {
    match cipher {
        None => frame::write_frame(w, payload),
        Some(c) => {
            let inner = frame::encode_frame(payload);
            let sealed = c.seal(&inner)?;
            frame::write_frame(w, &sealed)
        }
    }
}

/// Receives one logical message, opening it when `cipher` is present.
pub fn recv_message(
    r: &mut impl Read,
    cipher: Option<&SessionCipher>,
) -> Result<Vec<u8>, NetError> {
    match cipher {
        None => frame::read_frame(r),
        Some(c) => {
            let sealed = frame::read_frame(r)?;
            let inner = c.open(&sealed)?;
            frame::decode_frame(&inner)
        }
    }
}
