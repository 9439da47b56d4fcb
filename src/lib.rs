// RaptoDB — in-memory key-value database server.

pub mod cli;
pub mod config;
pub mod hashcmp;
pub mod memtrack;
pub mod net;
pub mod object;
pub mod server;
pub mod snapshot;
pub mod store;
pub mod verbosity;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level convenience re-exports for the most common API entry points.
// ─────────────────────────────────────────────────────────────────────────────

/// Protocol version exchanged on connect.
pub use config::PROTOCOL_VERSION;

/// Typed record and its parts.
pub use object::{Field, Metadata, Object};

/// Canonical object serialization.
pub use object::codec::{deserialize, serialize, CodecError};

/// The in-memory store.
pub use store::{Store, StoreError};

/// Server entry points.
pub use server::{run, Server, ServerConfig, ServerError};

/// Client connector, used by tooling and integration tests.
pub use net::{ConnectOptions, Connection};
