//! Client connector.
//!
//! Drives the client half of the session protocol: version exchange,
//! optional key exchange and auth, display-name registration, then framed
//! query/response round-trips. Used by tooling and by the end-to-end test
//! suite; the server never links against this module's flow.

use crate::config::{PROTOCOL_VERSION, SOCKET_DEADLINE_MS};
use crate::net::cipher::{SessionCipher, KEY_LEN, NONCE_LEN};
use crate::net::handshake::{MSG_AUTH_OK, MSG_RECVD_SK, MSG_SEND_AUTHPASS, MSG_SEND_PK, MSG_SEND_SK};
use crate::net::{frame, recv_message, send_message, NetError};
use rand::rngs::OsRng;
use rand::RngCore;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Connection parameters.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Display name registered with the server; an empty name is sent as a
    /// blank placeholder and stored as anonymous.
    pub name: String,
    /// Expect the server-driven key exchange.
    pub tls: bool,
    /// Password for post-handshake auth; implies `tls`.
    pub password: Option<Vec<u8>>,
    /// Socket read/write deadline, milliseconds.
    pub deadline_ms: u64,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions {
            name: String::new(),
            tls: false,
            password: None,
            deadline_ms: SOCKET_DEADLINE_MS,
        }
    }
}

/// An established client session.
pub struct Connection {
    stream: TcpStream,
    cipher: Option<SessionCipher>,
}

impl Connection {
    /// Connects, verifies the protocol version, and completes handshake,
    /// auth, and name registration as configured.
    pub fn connect(addr: impl ToSocketAddrs, opts: ConnectOptions) -> Result<Self, NetError> {
        let mut stream = TcpStream::connect(addr)?;
        let deadline = Some(Duration::from_millis(opts.deadline_ms));
        stream.set_read_timeout(deadline)?;
        stream.set_write_timeout(deadline)?;

        frame::write_frame(&mut stream, PROTOCOL_VERSION.as_bytes())?;

        let tls = opts.tls || opts.password.is_some();
        let mut cipher = if tls {
            Some(client_handshake(&mut stream)?)
        } else {
            None
        };

        if let Some(password) = &opts.password {
            let c = cipher.as_mut().ok_or(NetError::HandshakeFail)?;
            client_auth(&mut stream, c, password)?;
        }

        let name = if opts.name.is_empty() { " " } else { opts.name.as_str() };
        send_message(&mut stream, cipher.as_mut(), name.as_bytes())?;

        Ok(Connection { stream, cipher })
    }

    /// Sends a query without waiting for a response (`DOWN` has none).
    pub fn send(&mut self, line: impl AsRef<[u8]>) -> Result<(), NetError> {
        send_message(&mut self.stream, self.cipher.as_mut(), line.as_ref())
    }

    /// Receives one response payload.
    pub fn recv(&mut self) -> Result<Vec<u8>, NetError> {
        recv_message(&mut self.stream, self.cipher.as_ref())
    }

    /// Sends a query and returns its response payload.
    pub fn query(&mut self, line: impl AsRef<[u8]>) -> Result<Vec<u8>, NetError> {
        self.send(line)?;
        self.recv()
    }

    /// Sends a query and returns the response as a UTF-8 string.
    pub fn query_str(&mut self, line: &str) -> Result<String, NetError> {
        let raw = self.query(line)?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

/// Client half of the key exchange.
///
/// An X25519 keypair is generated and the public half is handed to the
/// server, which uses it directly as a symmetric key for the session-key
/// delivery; the secret half never participates. No MITM resistance is
/// gained by the exchange.
fn client_handshake(stream: &mut TcpStream) -> Result<SessionCipher, NetError> {
    let request = frame::read_frame(stream)?;
    if request.starts_with(b"compatible-version=") {
        return Err(NetError::UnmatchVersion);
    }
    if request != MSG_SEND_PK {
        return Err(NetError::HandshakeFail);
    }

    let secret = x25519_dalek::StaticSecret::random_from_rng(OsRng);
    let public = x25519_dalek::PublicKey::from(&secret);
    frame::write_frame(stream, public.as_bytes())?;

    let announce = frame::read_frame(stream)?;
    if announce != MSG_SEND_SK {
        return Err(NetError::HandshakeFail);
    }

    let sealed = frame::read_frame(stream)?;
    let boot = SessionCipher::new(public.as_bytes(), [0u8; NONCE_LEN]);
    let session_key: [u8; KEY_LEN] = boot
        .open(&sealed)?
        .try_into()
        .map_err(|_| NetError::HandshakeFail)?;

    frame::write_frame(stream, MSG_RECVD_SK)?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    Ok(SessionCipher::new(&session_key, nonce))
}

/// Client half of password auth.
fn client_auth(
    stream: &mut TcpStream,
    cipher: &mut SessionCipher,
    password: &[u8],
) -> Result<(), NetError> {
    let prompt = recv_message(stream, Some(cipher))?;
    if prompt != MSG_SEND_AUTHPASS {
        return Err(NetError::HandshakeFail);
    }
    send_message(stream, Some(cipher), password)?;
    let verdict = recv_message(stream, Some(cipher))?;
    if verdict == MSG_AUTH_OK {
        Ok(())
    } else {
        Err(NetError::AuthFail)
    }
}
