//! Server-driven key exchange and password auth.
//!
//! The exchange is TLS-shaped but carries no certificates and performs no
//! Diffie-Hellman agreement: the client's X25519 public key is used directly
//! as a symmetric key to deliver the session key. It is a confidentiality
//! primitive only and does not resist an active man-in-the-middle.
//!
//! Dialogue (server perspective):
//!
//! 1. send `send-pk`;
//! 2. receive the client's 32-byte public key;
//! 3. send `send-sk`, then the session key sealed under the client key;
//! 4. receive `recvd-sk`.
//!
//! Auth runs after the handshake, over the established AEAD session:
//! `send-authpass` → password bytes → `recvd-authpass:OK` / `recvd-authpass:NO`.

use crate::net::cipher::{SessionCipher, KEY_LEN, NONCE_LEN};
use crate::net::{frame, recv_message, send_message, NetError};
use rand::rngs::OsRng;
use rand::RngCore;
use std::net::TcpStream;

/// Server request for the client public key.
pub const MSG_SEND_PK: &[u8] = b"send-pk";
/// Server announcement that the sealed session key follows.
pub const MSG_SEND_SK: &[u8] = b"send-sk";
/// Client acknowledgement of the session key.
pub const MSG_RECVD_SK: &[u8] = b"recvd-sk";
/// Server request for the password.
pub const MSG_SEND_AUTHPASS: &[u8] = b"send-authpass";
/// Password accepted.
pub const MSG_AUTH_OK: &[u8] = b"recvd-authpass:OK";
/// Password rejected; the server closes the connection.
pub const MSG_AUTH_NO: &[u8] = b"recvd-authpass:NO";

/// Runs the server side of the key exchange and returns the session cipher.
pub fn server_handshake(stream: &mut TcpStream) -> Result<SessionCipher, NetError> {
    frame::write_frame(stream, MSG_SEND_PK)?;

    let client_pk: [u8; KEY_LEN] = frame::read_frame(stream)?
        .try_into()
        .map_err(|_| NetError::HandshakeFail)?;

    let mut session_key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut session_key);
    let mut session_nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut session_nonce);

    frame::write_frame(stream, MSG_SEND_SK)?;
    let mut boot_nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut boot_nonce);
    let mut boot = SessionCipher::new(&client_pk, boot_nonce);
    let sealed_key = boot.seal(&session_key)?;
    frame::write_frame(stream, &sealed_key)?;

    let ack = frame::read_frame(stream)?;
    if ack != MSG_RECVD_SK {
        return Err(NetError::HandshakeFail);
    }
    Ok(SessionCipher::new(&session_key, session_nonce))
}

/// Runs the server side of password auth over the established session.
/// Returns `true` on a byte-equal match; the caller closes on `false`.
pub fn server_auth(
    stream: &mut TcpStream,
    cipher: &mut SessionCipher,
    password: &[u8],
) -> Result<bool, NetError> {
    send_message(stream, Some(cipher), MSG_SEND_AUTHPASS)?;
    let supplied = recv_message(stream, Some(cipher))?;
    let accepted = supplied == password;
    let verdict = if accepted { MSG_AUTH_OK } else { MSG_AUTH_NO };
    send_message(stream, Some(cipher), verdict)?;
    Ok(accepted)
}
