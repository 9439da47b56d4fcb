//! Per-connection reader thread.
//!
//! Each accepted socket gets one detached thread that walks the session
//! through version check, optional handshake and auth, and name
//! registration, then loops reading query frames into the shared work
//! queue. The thread owns the read half and its decrypt state; responses
//! travel through the [`Session`] writer owned by the executor side.
//!
//! Deadline expiries and invalid-length frames are tolerated (the loop
//! reads the next frame); a peer reset or any other failure ends the
//! connection and deregisters the session.

use crate::config::PROTOCOL_VERSION;
use crate::net::{frame, handshake, recv_message, NetError, SessionCipher};
use crate::server::queue::{Query, Work, WorkQueue};
use crate::server::session::{Registry, Session};
use crate::verbosity::{LEVEL_NOISY, LEVEL_WARNINGS};
use crate::vlog;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

/// Immutable parameters shared by every connection handler.
pub struct ConnectionParams {
    pub tls: bool,
    pub auth: Option<Vec<u8>>,
    pub deadline_ms: u64,
}

/// Runs one connection to completion. Never panics back into the acceptor;
/// all failures end in a deregistered session and a closed socket.
pub fn handle(
    mut stream: TcpStream,
    id: u64,
    params: &ConnectionParams,
    registry: &Registry,
    queue: &WorkQueue,
) {
    let peer = match stream.peer_addr() {
        Ok(addr) => addr,
        Err(_) => return,
    };
    let deadline = Some(Duration::from_millis(params.deadline_ms));
    if stream.set_read_timeout(deadline).is_err() || stream.set_write_timeout(deadline).is_err() {
        return;
    }

    // ── Version gate ──────────────────────────────────────────────────────
    let version = match frame::read_frame(&mut stream) {
        Ok(v) => v,
        Err(_) => return,
    };
    if version != PROTOCOL_VERSION.as_bytes() {
        let reply = format!("compatible-version={PROTOCOL_VERSION}");
        let _ = frame::write_frame(&mut stream, reply.as_bytes());
        vlog!(LEVEL_WARNINGS, "client {id}: version mismatch, rejected");
        return;
    }

    // ── Handshake and auth ────────────────────────────────────────────────
    let mut cipher: Option<SessionCipher> = None;
    if params.tls {
        match handshake::server_handshake(&mut stream) {
            Ok(c) => cipher = Some(c),
            Err(e) => {
                let _ = frame::write_frame(&mut stream, b"tls-handshake-fail");
                vlog!(LEVEL_WARNINGS, "client {id}: handshake failed: {e}");
                return;
            }
        }
    }
    if let Some(password) = &params.auth {
        // Auth without an established cipher is a configuration bug; the
        // server upgrades --auth to --tls before accepting connections.
        let Some(c) = cipher.as_mut() else { return };
        match handshake::server_auth(&mut stream, c, password) {
            Ok(true) => {}
            Ok(false) => {
                vlog!(LEVEL_WARNINGS, "client {id}: auth rejected");
                return;
            }
            Err(e) => {
                vlog!(LEVEL_WARNINGS, "client {id}: auth failed: {e}");
                return;
            }
        }
    }

    // ── Name registration ─────────────────────────────────────────────────
    let name = match recv_message(&mut stream, cipher.as_ref()) {
        Ok(raw) => {
            let text = String::from_utf8_lossy(&raw).trim().to_string();
            (!text.is_empty()).then_some(text)
        }
        Err(_) => return,
    };

    let writer = match stream.try_clone() {
        Ok(w) => w,
        Err(_) => return,
    };
    let session = Arc::new(Session::new(id, peer, writer, cipher.clone(), name));
    registry.register(Arc::clone(&session));
    vlog!(
        LEVEL_NOISY,
        "client {id} connected from {peer} ({})",
        session.name().unwrap_or("anonymous")
    );

    // ── Query loop ────────────────────────────────────────────────────────
    loop {
        match recv_message(&mut stream, cipher.as_ref()) {
            Ok(line) => queue.push(Work::Query(Query {
                client: Arc::clone(&session),
                line,
            })),
            Err(e) if e.is_timeout() => continue,
            Err(NetError::InvalidLength(len)) => {
                vlog!(LEVEL_WARNINGS, "client {id}: invalid frame length {len}");
                continue;
            }
            Err(NetError::DecryptionFail) => {
                let _ = session.respond(b"decryption-fail");
                break;
            }
            Err(NetError::PeerReset) => break,
            Err(e) => {
                vlog!(LEVEL_WARNINGS, "client {id}: read failed: {e}");
                break;
            }
        }
    }

    registry.deregister(id);
    vlog!(LEVEL_NOISY, "client {id} disconnected");
}
