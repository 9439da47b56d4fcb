//! Client session identity and response path.
//!
//! A [`Session`] owns the write half of a connection: a cloned stream handle
//! plus the optional AEAD state, behind a mutex so the executor can respond
//! while the reader thread keeps consuming queries. The [`Registry`] is the
//! connected set, keyed by the accept-time session id.

use crate::net::{send_message, NetError, SessionCipher};
use std::collections::HashMap;
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};

struct ResponseWriter {
    stream: TcpStream,
    cipher: Option<SessionCipher>,
}

/// One connected client.
pub struct Session {
    id: u64,
    addr: SocketAddr,
    name: Option<String>,
    writer: Mutex<ResponseWriter>,
}

impl Session {
    /// Wraps the write half of an accepted connection.
    pub fn new(
        id: u64,
        addr: SocketAddr,
        stream: TcpStream,
        cipher: Option<SessionCipher>,
        name: Option<String>,
    ) -> Self {
        Session {
            id,
            addr,
            name,
            writer: Mutex::new(ResponseWriter { stream, cipher }),
        }
    }

    /// Accept-time session id, strictly increasing across the process.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Peer address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Display name announced after the handshake, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Writes one response payload on this session's stream, sealed when
    /// the session is encrypted.
    pub fn respond(&self, payload: &[u8]) -> Result<(), NetError> {
        let mut w = self.writer.lock().unwrap();
        let ResponseWriter { stream, cipher } = &mut *w;
        send_message(stream, cipher.as_mut(), payload)
    }
}

/// The connected set.
pub struct Registry {
    inner: Mutex<HashMap<u64, Arc<Session>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, session: Arc<Session>) {
        self.inner.lock().unwrap().insert(session.id(), session);
    }

    pub fn deregister(&self, id: u64) {
        self.inner.lock().unwrap().remove(&id);
    }

    /// Number of connected clients.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}
